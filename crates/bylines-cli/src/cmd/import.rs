use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use bylines_core::store::import::{ImportReport, import_jsonl};

use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSONL dump to load (one record per line).
    #[arg(long, value_name = "PATH")]
    pub file: PathBuf,
}

#[derive(Serialize)]
struct ImportSummary {
    file: String,
    actors: usize,
    works: usize,
    versions: usize,
    collections: usize,
    links: usize,
    events: usize,
}

impl ImportSummary {
    fn new(file: &Path, report: ImportReport) -> Self {
        Self {
            file: file.display().to_string(),
            actors: report.actors,
            works: report.works,
            versions: report.versions,
            collections: report.collections,
            links: report.links,
            events: report.events,
        }
    }
}

/// Execute `byl import`: bulk-load a JSONL dump into the store.
///
/// # Errors
///
/// Returns an error if the store is missing, the file cannot be read, or
/// any line fails to parse (the whole import rolls back).
pub fn run_import(args: &ImportArgs, db: &Path, mode: OutputMode) -> Result<()> {
    let mut conn = super::open_existing_store(db)?;

    let file = File::open(&args.file)
        .with_context(|| format!("open import file {}", args.file.display()))?;
    let report = import_jsonl(&mut conn, BufReader::new(file))?;

    let summary = ImportSummary::new(&args.file, report);
    render(mode, &summary, |s, w| {
        writeln!(w, "✓ Imported {}", s.file)?;
        writeln!(
            w,
            "  {} actors, {} works, {} versions, {} collections, {} links, {} events",
            s.actors, s.works, s.versions, s.collections, s.links, s.events
        )
    })
}
