//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// shellcache - Offline asset cache for web application shells
///
/// Keeps a content-hashed copy of a deployed web app so it loads without
/// a network, reusing unchanged files across deployments.
#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHELLCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install the current manifest and activate it
    Sync(SyncArgs),

    /// Resolve one request through the cache
    Fetch(FetchArgs),

    /// Download every manifest resource missing from the cache
    Offline,

    /// Show the state of the cache stores
    Status(StatusArgs),

    /// Delete all cache stores
    Reset(ResetArgs),

    /// Work with resource manifests
    Manifest(ManifestArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the sync command
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Install only and leave the new generation waiting
    #[arg(long, conflicts_with = "skip_waiting")]
    pub wait: bool,

    /// Send skipWaiting after install, activating even when
    /// lifecycle.skip_waiting_on_install is false
    #[arg(long)]
    pub skip_waiting: bool,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Request URL
    pub url: String,

    /// HTTP method
    #[arg(short, long, default_value = "GET")]
    pub method: String,

    /// Write the response body to this file
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the reset command
#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the manifest command
#[derive(Parser, Debug)]
pub struct ManifestArgs {
    /// Subcommand for manifest
    #[command(subcommand)]
    pub action: ManifestAction,
}

/// Manifest subcommands
#[derive(Subcommand, Debug)]
pub enum ManifestAction {
    /// Hash a build output directory into a resource manifest
    Build {
        /// Build output directory
        dir: PathBuf,

        /// Document also recorded as the root `/`
        #[arg(long, default_value = "index.html")]
        index: String,

        /// Write the manifest here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Compare the configured manifest with the one last activated
    Diff,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., app.origin)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for status
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}
