//! Manifest command - build or compare resource manifests

use super::{CHECK, WARN};
use crate::cli::args::{ManifestAction, ManifestArgs};
use crate::cli::AppContext;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::manifest::ResourceManifest;
use crate::reconcile::diff_manifests;
use console::style;
use std::path::Path;
use tokio::fs;

/// Execute the manifest command
pub async fn execute(args: ManifestArgs, ctx: &AppContext) -> ShellcacheResult<()> {
    match args.action {
        ManifestAction::Build { dir, index, out } => build(&dir, &index, out.as_deref()).await,
        ManifestAction::Diff => diff(ctx).await,
    }
}

async fn build(dir: &Path, index: &str, out: Option<&Path>) -> ShellcacheResult<()> {
    if !dir.is_dir() {
        return Err(ShellcacheError::User(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let manifest = ResourceManifest::build_from_dir(dir, index)?;
    let json = manifest.to_json_pretty()?;

    match out {
        Some(path) => {
            fs::write(path, format!("{}\n", json))
                .await
                .map_err(|e| ShellcacheError::io(format!("writing {}", path.display()), e))?;
            println!(
                "{} Wrote {} resources to {}",
                CHECK,
                manifest.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

async fn diff(ctx: &AppContext) -> ShellcacheResult<()> {
    let manager = ctx.cache_manager().await?;

    let Some(stored) = manager.stored_manifest().await? else {
        println!(
            "{} No activated manifest; all {} resources are new",
            WARN,
            manager.manifest().len()
        );
        return Ok(());
    };

    let diff = diff_manifests(&stored, manager.manifest());
    if diff.is_empty() {
        println!("{} Activated manifest matches {}", CHECK, ctx.config.app.manifest.display());
        return Ok(());
    }

    for key in &diff.added {
        println!("  {} {}", style("+").green(), key);
    }
    for key in &diff.changed {
        println!("  {} {}", style("~").yellow(), key);
    }
    for key in &diff.removed {
        println!("  {} {}", style("-").red(), key);
    }
    println!();
    println!(
        "{} added, {} changed, {} removed",
        diff.added.len(),
        diff.changed.len(),
        diff.removed.len()
    );

    Ok(())
}
