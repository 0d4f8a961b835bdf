//! Status command - show the state of the cache stores

use super::{CHECK, CROSS, WARN};
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::cli::AppContext;
use crate::config::ConfigManager;
use crate::error::ShellcacheResult;
use crate::manager::{CacheStatus, StoredManifest};
use console::style;

/// Missing keys listed before the rest are summarized
const MAX_MISSING_SHOWN: usize = 10;

/// Execute the status command
pub async fn execute(args: StatusArgs, ctx: &AppContext) -> ShellcacheResult<()> {
    let manager = ctx.cache_manager().await?;
    let status = manager.status().await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Table => print_status(&status, ctx),
    }

    Ok(())
}

fn print_status(status: &CacheStatus, ctx: &AppContext) {
    println!("{}", style("shellcache status").bold().cyan());
    println!();
    println!("  Origin:    {}", status.origin);
    println!(
        "  Stores:    {} ({})",
        ConfigManager::cache_dir(&ctx.config).display(),
        status.backend
    );
    println!(
        "  Manifest:  {} resources",
        status.manifest_entries
    );
    println!();

    match status.stored_manifest {
        StoredManifest::Current => println!("  {} Activated manifest is current", CHECK),
        StoredManifest::Outdated => println!(
            "  {} Activated manifest is outdated; run {}",
            WARN,
            style("shellcache sync").cyan()
        ),
        StoredManifest::Absent => println!(
            "  {} Nothing activated yet; run {}",
            CROSS,
            style("shellcache sync").cyan()
        ),
    }

    println!(
        "  Content:   {} entries, {} missing",
        status.content_entries,
        status.missing.len()
    );
    if status.temp_entries > 0 {
        println!(
            "  {} {} staged entries left from an unfinished install",
            WARN, status.temp_entries
        );
    }

    for key in status.missing.iter().take(MAX_MISSING_SHOWN) {
        println!("    {} {}", style("missing").dim(), key);
    }
    if status.missing.len() > MAX_MISSING_SHOWN {
        println!(
            "    ... and {} more (run {} to fetch them)",
            status.missing.len() - MAX_MISSING_SHOWN,
            style("shellcache offline").cyan()
        );
    }
}
