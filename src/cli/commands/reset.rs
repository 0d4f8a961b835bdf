//! Reset command - delete all cache stores

use super::CHECK;
use crate::cli::args::ResetArgs;
use crate::cli::AppContext;
use crate::error::ShellcacheResult;
use crate::store::{delete_stores, StoreNames};
use std::io::{self, Write};

/// Execute the reset command
///
/// Works without a readable manifest so a broken deployment can still be
/// cleared.
pub async fn execute(args: ResetArgs, ctx: &AppContext) -> ShellcacheResult<()> {
    let names = StoreNames::from_config(&ctx.config);

    if !args.yes {
        print!("Delete stores {}? [y/N] ", names.all().join(", "));
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let storage = ctx.storage();
    let deleted = delete_stores(storage.as_ref(), &names).await?;
    println!("{} Deleted {} store(s)", CHECK, deleted);
    Ok(())
}
