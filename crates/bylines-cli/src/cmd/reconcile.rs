use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::Path;

use bylines_core::store::query;
use bylines_core::{BatchReport, OwnerRef, Reconciler, reconcile_all};

use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Reconcile only this work (all of its versions). Default: everything.
    #[arg(long, value_name = "WORK_ID")]
    pub work: Option<i64>,
}

#[derive(Serialize)]
struct ReconcileSummary {
    owners: usize,
    migrated: usize,
    skipped: usize,
    errors: Vec<String>,
}

impl From<BatchReport> for ReconcileSummary {
    fn from(report: BatchReport) -> Self {
        Self {
            owners: report.owners,
            migrated: report.migrated,
            skipped: report.skipped,
            errors: report.errors,
        }
    }
}

/// Execute `byl reconcile`: replay the change log into authorship rows.
///
/// Data errors are part of the report, not a failure of the command; the
/// command itself fails only on store-level problems.
///
/// # Errors
///
/// Returns an error if the store is missing or a query/write fails.
pub fn run_reconcile(args: &ReconcileArgs, db: &Path, mode: OutputMode) -> Result<()> {
    let mut conn = super::open_existing_store(db)?;

    let report = match args.work {
        Some(work_id) => reconcile_work(&mut conn, work_id)?,
        None => reconcile_all(&mut conn)?,
    };

    let summary = ReconcileSummary::from(report);
    render(mode, &summary, |s, w| {
        writeln!(
            w,
            "✓ Reconciled {} owners: {} migrated, {} skipped",
            s.owners, s.migrated, s.skipped
        )?;
        if !s.errors.is_empty() {
            writeln!(w, "  {} data errors:", s.errors.len())?;
            for error in &s.errors {
                writeln!(w, "    {error}")?;
            }
        }
        Ok(())
    })
}

fn reconcile_work(conn: &mut rusqlite::Connection, work_id: i64) -> Result<BatchReport> {
    let versions = query::work_versions_for_work(conn, work_id)?;
    if versions.is_empty() {
        anyhow::bail!("work #{work_id} has no versions");
    }

    let mut report = BatchReport::default();
    let mut reconciler = Reconciler::new(conn);
    for version in versions {
        let owner = OwnerRef::work_version(version.version_id);
        let outcome = reconciler.reconcile(owner, version.version_number)?;
        report.owners += 1;
        report.migrated += outcome.migrated;
        report.skipped += outcome.skipped;
        report.errors.extend(outcome.errors);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use serde_json::json;

    fn seeded_conn() -> rusqlite::Connection {
        let conn = bylines_core::store::open_in_memory().expect("open store");
        conn.execute(
            "INSERT INTO actors (actor_id, given_name, surname, email)
             VALUES (1, 'Jane', 'Doe', '')",
            [],
        )
        .expect("insert actor");
        conn.execute("INSERT INTO works (work_id) VALUES (5)", [])
            .expect("insert work");
        conn.execute(
            "INSERT INTO work_versions (version_id, work_id, version_number, title)
             VALUES (10, 5, 1, 'Dataset')",
            [],
        )
        .expect("insert version");
        conn.execute(
            "INSERT INTO change_events
                (subject_type, subject_id, parent_id, kind, actor_ref, snapshot, delta, occurred_at_us)
             VALUES ('work_version_creator_link', 100, 10, 'created', 'actor:1', ?1, NULL, 1000)",
            params![json!({"actor_id": 1, "position": 1}).to_string()],
        )
        .expect("insert event");
        conn
    }

    #[test]
    fn scoped_run_covers_all_versions_of_the_work() {
        let mut conn = seeded_conn();
        let report = reconcile_work(&mut conn, 5).expect("reconcile");
        assert_eq!(report.owners, 1);
        assert_eq!(report.migrated, 1);
        assert!(report.success());
    }

    #[test]
    fn scoped_run_rejects_unknown_work() {
        let mut conn = seeded_conn();
        assert!(reconcile_work(&mut conn, 999).is_err());
    }
}
