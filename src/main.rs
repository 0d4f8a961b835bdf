//! Shellcache - offline asset cache for web application shells
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use shellcache::cli::{AppContext, Cli, Commands};
use shellcache::config::ConfigManager;
use shellcache::error::{ShellcacheError, ShellcacheResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ShellcacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => {
            // An explicit path must exist unless the config command is creating it
            if !path.exists() && !matches!(cli.command, Commands::Config(_)) {
                return Err(ShellcacheError::ConfigNotFound(path.clone()));
            }
            ConfigManager::with_path(path.clone())
        }
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("shellcache=warn"),
        1 => EnvFilter::new("shellcache=info"),
        _ => EnvFilter::new("shellcache=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }

    debug!("Using config {}", config_manager.path().display());
    let ctx = AppContext::new(config_manager, config);

    match cli.command {
        Commands::Sync(args) => shellcache::cli::commands::sync(args, &ctx).await,
        Commands::Fetch(args) => shellcache::cli::commands::fetch(args, &ctx).await,
        Commands::Offline => shellcache::cli::commands::offline(&ctx).await,
        Commands::Status(args) => shellcache::cli::commands::status(args, &ctx).await,
        Commands::Reset(args) => shellcache::cli::commands::reset(args, &ctx).await,
        Commands::Manifest(args) => shellcache::cli::commands::manifest(args, &ctx).await,
        Commands::Config(args) => shellcache::cli::commands::config(args, &ctx).await,
    }
}
