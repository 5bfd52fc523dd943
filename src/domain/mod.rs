// Domain module - Configuration and error types
pub mod config;
pub mod error;

pub use config::{FlowControl, GlobalConfig, Parity, SerialConfig, TermLinkConfig};
pub use error::{TermLinkError, TermLinkResult};
