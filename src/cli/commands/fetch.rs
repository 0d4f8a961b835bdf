//! Fetch command - resolve one request the way an intercepted page load would

use super::{format_bytes, CHECK};
use crate::cli::args::FetchArgs;
use crate::cli::AppContext;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::fetch::FetchRequest;
use crate::manager::FetchOutcome;
use console::style;
use tokio::fs;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, ctx: &AppContext) -> ShellcacheResult<()> {
    let manager = ctx.cache_manager().await?;
    let request = FetchRequest::new(args.method, args.url);

    let outcome = manager.handle_fetch(&request).await?;
    let response = match &outcome {
        FetchOutcome::Passthrough => {
            println!(
                "{} {} is not cached; the network handles it directly",
                style("passthrough").dim(),
                request
            );
            return Ok(());
        }
        FetchOutcome::Cached(response) | FetchOutcome::Network(response) => response,
    };

    let status = if response.is_ok() {
        style(response.status.to_string()).green()
    } else {
        style(response.status.to_string()).red()
    };
    println!(
        "{} {} from {} ({}, {})",
        CHECK,
        status,
        style(outcome.source()).cyan(),
        response.content_type().unwrap_or("unknown type"),
        format_bytes(response.len() as u64)
    );

    if let Some(path) = args.out {
        fs::write(&path, &response.body)
            .await
            .map_err(|e| ShellcacheError::io(format!("writing {}", path.display()), e))?;
        println!("  Saved to {}", path.display());
    }

    Ok(())
}
