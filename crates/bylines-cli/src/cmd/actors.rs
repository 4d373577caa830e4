use anyhow::Result;
use clap::Args;
use std::path::Path;

use bylines_core::actor::list_actors;

use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct ActorsArgs {}

/// Execute `byl actors`: list every canonical identity in the store.
///
/// # Errors
///
/// Returns an error if the store is missing or the query fails.
pub fn run_actors(_args: &ActorsArgs, db: &Path, mode: OutputMode) -> Result<()> {
    let conn = super::open_existing_store(db)?;
    let actors = list_actors(&conn)?;

    render(mode, &actors, |actors, w| {
        if actors.is_empty() {
            return writeln!(w, "(no actors)");
        }
        for actor in actors {
            let orcid = actor.orcid.as_deref().unwrap_or("-");
            writeln!(
                w,
                "{}\t{}\t{}\t{}",
                actor.id,
                actor.display_name(),
                actor.email,
                orcid
            )?;
        }
        Ok(())
    })
}
