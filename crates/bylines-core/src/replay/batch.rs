//! Whole-store reconciliation.

use anyhow::Result;
use rusqlite::Connection;

use crate::event::OwnerRef;
use crate::store::query;

use super::engine::Reconciler;

/// Aggregated tallies from reconciling every owner in the store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Owners visited (work versions plus collections).
    pub owners: usize,
    /// Authorship rows created.
    pub migrated: usize,
    /// Groups skipped as already migrated.
    pub skipped: usize,
    /// Collected data errors across all owners.
    pub errors: Vec<String>,
}

impl BatchReport {
    /// Whether the batch completed without data errors.
    #[must_use]
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    fn absorb(&mut self, outcome: crate::replay::ReconcileOutcome) {
        self.owners += 1;
        self.migrated += outcome.migrated;
        self.skipped += outcome.skipped;
        self.errors.extend(outcome.errors);
    }
}

/// Reconcile every work version and collection in the store.
///
/// Owners reconcile independently; a data error in one is recorded on the
/// report and the batch moves on.
///
/// # Errors
///
/// Returns an error only for store-level failures.
pub fn reconcile_all(conn: &mut Connection) -> Result<BatchReport> {
    let versions = query::all_work_versions(conn)?;
    let collections = query::all_collections(conn)?;

    let mut report = BatchReport::default();
    let mut reconciler = Reconciler::new(conn);

    for version in versions {
        let owner = OwnerRef::work_version(version.version_id);
        let outcome = reconciler.reconcile(owner, version.version_number)?;
        report.absorb(outcome);
    }

    for collection in collections {
        let owner = OwnerRef::collection(collection.collection_id);
        let outcome = reconciler.reconcile(owner, 1)?;
        report.absorb(outcome);
    }

    tracing::info!(
        owners = report.owners,
        migrated = report.migrated,
        skipped = report.skipped,
        errors = report.errors.len(),
        "batch reconciliation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, SubjectType};
    use crate::store;
    use rusqlite::params;
    use serde_json::json;

    fn seed_store(conn: &Connection) {
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
            "INSERT INTO collections (collection_id, title) VALUES (20, 'Theses')",
            [],
        )
        .expect("insert collection");

        for (subject_type, subject_id, parent_id) in [
            (SubjectType::WorkVersionCreatorLink, 100_i64, 10_i64),
            (SubjectType::CollectionCreatorLink, 101, 20),
        ] {
            conn.execute(
                "INSERT INTO change_events
                    (subject_type, subject_id, parent_id, kind, actor_ref, snapshot, delta, occurred_at_us)
                 VALUES (?1, ?2, ?3, ?4, 'actor:1', ?5, NULL, 1000)",
                params![
                    subject_type.as_str(),
                    subject_id,
                    parent_id,
                    EventKind::Created.as_str(),
                    json!({"actor_id": 1, "position": 1}).to_string(),
                ],
            )
            .expect("insert event");
        }
    }

    #[test]
    fn batch_covers_versions_and_collections() {
        let mut conn = store::open_in_memory().expect("open in-memory store");
        seed_store(&conn);

        let report = reconcile_all(&mut conn).expect("batch");
        assert!(report.success());
        assert_eq!(report.owners, 2);
        assert_eq!(report.migrated, 2);

        let collection_rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM authorships WHERE owner_type = 'collection'",
                [],
                |row| row.get(0),
            )
            .expect("count");
        assert_eq!(collection_rows, 1);
    }

    #[test]
    fn batch_rerun_converges() {
        let mut conn = store::open_in_memory().expect("open in-memory store");
        seed_store(&conn);

        let first = reconcile_all(&mut conn).expect("first");
        assert_eq!(first.migrated, 2);

        let second = reconcile_all(&mut conn).expect("second");
        assert_eq!(second.migrated, 0);
        assert_eq!(second.skipped, 2);

        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM authorships", [], |row| row.get(0))
            .expect("count");
        assert_eq!(total, 2);
    }

    #[test]
    fn empty_store_reports_zero_owners() {
        let mut conn = store::open_in_memory().expect("open in-memory store");
        let report = reconcile_all(&mut conn).expect("batch");
        assert!(report.success());
        assert_eq!(report.owners, 0);
    }
}
