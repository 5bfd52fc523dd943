// TermLink - Serial Terminal
use clap::Parser;
use termlink::cli::args::Args;
use termlink::cli::commands::execute_command;
use termlink::infrastructure::config::ConfigManager;
use termlink::infrastructure::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    if let Err(e) = init_logging(default_level) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    let config = ConfigManager::new()
        .and_then(|manager| manager.load_config())
        .unwrap_or_default();

    if let Err(e) = execute_command(args, config).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
