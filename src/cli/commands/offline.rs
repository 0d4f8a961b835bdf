//! Offline command - complete the content store

use super::CHECK;
use crate::cli::AppContext;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::manager::{ControlMessage, MessageOutcome};

/// Execute the offline command
pub async fn execute(ctx: &AppContext) -> ShellcacheResult<()> {
    let manager = ctx.cache_manager().await?;

    match manager.handle_message(ControlMessage::DownloadOffline).await? {
        MessageOutcome::DownloadOffline(report) if report.fetched == 0 => {
            println!(
                "{} All {} resources already available offline",
                CHECK, report.already_cached
            );
        }
        MessageOutcome::DownloadOffline(report) => {
            println!(
                "{} Downloaded {} resources ({} already cached)",
                CHECK, report.fetched, report.already_cached
            );
        }
        other => {
            return Err(ShellcacheError::Internal(format!(
                "unexpected reply to downloadOffline: {:?}",
                other
            )))
        }
    }

    Ok(())
}
