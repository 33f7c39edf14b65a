//! apt-fetch - scheduled apt package prefetcher
//!
//! CLI entry point that dispatches on the mode flags.

use apt_fetch::cli::{commands, Cli, Mode, OutputFormat};
use apt_fetch::config::{Config, ConfigManager};
use apt_fetch::error::AptFetchResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mode = cli.mode();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Consumers of JSON output read stdout only
            if matches!(
                mode,
                Mode::Status(OutputFormat::Json) | Mode::Prune(OutputFormat::Json)
            ) {
                println!("{}", serde_json::json!({ "error": e.to_string() }));
            }
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AptFetchResult<()> {
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load_with(cli.overrides()).await?;

    init_logging(cli.verbose, &config);
    debug!("Loaded configuration from {}", config_manager.path().display());

    match cli.mode() {
        Mode::Fetch => commands::fetch(&config).await,
        Mode::Status(format) => commands::status(format, &config).await,
        Mode::Prune(format) => commands::prune(format, &config).await,
    }
}

/// Diagnostics go to stderr: 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("apt_fetch=warn"),
        1 => EnvFilter::new("apt_fetch=info"),
        _ => EnvFilter::new("apt_fetch=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
