use crate::domain::{config::TermLinkConfig, error::{TermLinkError, TermLinkResult}};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> TermLinkResult<Self> {
        Ok(Self {
            config_path: Self::default_config_path()?,
        })
    }

    /// Load configuration, falling back to defaults when the file is
    /// missing.
    pub fn load_config(&self) -> TermLinkResult<TermLinkConfig> {
        if self.config_path.exists() {
            Self::load_config_from_path(&self.config_path)
        } else {
            Ok(TermLinkConfig::default())
        }
    }

    /// Save configuration, creating the config directory if needed.
    pub fn save_config(&self, config: &TermLinkConfig) -> TermLinkResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| TermLinkError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }
        Self::save_config_to_path(&self.config_path, config)
    }

    /// Load configuration from a specific path
    pub fn load_config_from_path(path: &Path) -> TermLinkResult<TermLinkConfig> {
        let content = fs::read_to_string(path).map_err(|e| TermLinkError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| TermLinkError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Save configuration to a specific path
    pub fn save_config_to_path(path: &Path, config: &TermLinkConfig) -> TermLinkResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| TermLinkError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| TermLinkError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    fn default_config_path() -> TermLinkResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| TermLinkError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join("termlink").join("config.toml"))
    }
}
