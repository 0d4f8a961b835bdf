//! Sync command - install the current manifest and activate it

use super::{format_bytes, CHECK, WARN};
use crate::cli::args::SyncArgs;
use crate::cli::AppContext;
use crate::error::ShellcacheResult;
use crate::manager::{ControlMessage, MessageOutcome};
use console::style;
use tracing::debug;

/// Execute the sync command
pub async fn execute(args: SyncArgs, ctx: &AppContext) -> ShellcacheResult<()> {
    let manager = ctx.cache_manager().await?;
    debug!("Generation {}", manager.generation());

    let installed = manager.install().await?;
    println!(
        "{} Installed {} core resources ({})",
        CHECK,
        installed.staged,
        format_bytes(installed.bytes)
    );

    if args.skip_waiting {
        if let MessageOutcome::SkipWaiting { activate_now } =
            manager.handle_message(ControlMessage::SkipWaiting).await?
        {
            debug!("skipWaiting sent, activate now: {}", activate_now);
        }
    }

    if args.wait || !manager.should_activate() {
        println!(
            "{} Left waiting, content store untouched; run {} to activate",
            WARN,
            style("shellcache sync --skip-waiting").cyan()
        );
        return Ok(());
    }

    let report = manager.activate().await?;
    if report.fresh_install {
        println!(
            "{} Activated fresh cache with {} resources",
            CHECK, report.promoted
        );
    } else {
        println!(
            "{} Activated: {} evicted, {} reused, {} refreshed",
            CHECK,
            report.evicted.len(),
            report.retained,
            report.promoted
        );
        for key in &report.evicted {
            println!("    {} {}", style("-").red(), key);
        }
    }

    Ok(())
}
