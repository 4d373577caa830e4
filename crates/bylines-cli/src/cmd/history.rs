use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::path::Path;

use bylines_core::Timeline;
use bylines_core::history::{HistoryEntry, VersionTimeline};

use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Work to show history for.
    #[arg(value_name = "WORK_ID")]
    pub work_id: i64,
}

/// Execute `byl history`: render the merged per-version timeline.
///
/// # Errors
///
/// Returns an error if the store is missing, the work has no versions, or
/// an event row is malformed.
pub fn run_history(args: &HistoryArgs, db: &Path, mode: OutputMode) -> Result<()> {
    let conn = super::open_existing_store(db)?;
    let timeline = Timeline::build(&conn, args.work_id)?;

    render_mode(mode, &timeline, write_text, write_pretty)
}

fn entry_line(entry: &HistoryEntry) -> String {
    let subject = format!("{}#{}", entry.subject_type, entry.subject_id);
    let changes = entry
        .changed
        .iter()
        .map(|diff| format!("{}: {:?} -> {:?}", diff.field.label(), diff.old, diff.new))
        .collect::<Vec<_>>()
        .join(", ");

    if changes.is_empty() {
        format!(
            "{}\t{}\t{}\t{}",
            entry.occurred_at, entry.kind, subject, entry.actor
        )
    } else {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            entry.occurred_at, entry.kind, subject, entry.actor, changes
        )
    }
}

fn section_heading(section: &VersionTimeline) -> String {
    format!(
        "Version {} — {}",
        section.version.version_number, section.version.title
    )
}

fn write_text(timeline: &Timeline, w: &mut dyn Write) -> std::io::Result<()> {
    for section in &timeline.versions {
        writeln!(w, "# {}", section_heading(section))?;
        for entry in &section.entries {
            writeln!(w, "{}", entry_line(entry))?;
        }
    }
    Ok(())
}

fn write_pretty(timeline: &Timeline, w: &mut dyn Write) -> std::io::Result<()> {
    for section in &timeline.versions {
        pretty_section(w, &section_heading(section))?;
        if section.entries.is_empty() {
            writeln!(w, "  (no recorded changes)")?;
        }
        for entry in &section.entries {
            writeln!(w, "  {}", entry_line(entry))?;
        }
        writeln!(w)?;
    }
    Ok(())
}
