//! End-to-end scenarios: import a JSONL dump, reconcile, inspect results.

use std::io::Cursor;

use bylines_core::event::OwnerRef;
use bylines_core::store::{self, import::import_jsonl, query};
use bylines_core::{Timeline, reconcile_all};
use rusqlite::Connection;

fn load(dump: &str) -> Connection {
    let mut conn = store::open_in_memory().expect("open store");
    import_jsonl(&mut conn, Cursor::new(dump.trim_start())).expect("import dump");
    conn
}

const HAPPY_PATH: &str = r#"
{"type":"actor","id":1,"given_name":"Jane","surname":"Doe","email":"jane@example.edu"}
{"type":"work","id":5}
{"type":"work_version","id":10,"work_id":5,"version_number":1,"title":"Dataset"}
{"type":"creator_link","id":100,"subject_type":"work_version_creator_link","parent_id":10,"actor_id":1,"display_name":"Jane Doe","position":1}
{"type":"change_event","subject_type":"work_version_creator_link","subject_id":100,"parent_id":10,"kind":"created","actor_ref":"actor:1","snapshot":{"actor_id":1,"display_name":"Jane","position":1},"occurred_at":"2021-03-04T12:00:00Z"}
{"type":"change_event","subject_type":"work_version_creator_link","subject_id":100,"parent_id":10,"kind":"updated","actor_ref":"actor:1","delta":{"display_name":["Jane","Jane Doe"]},"occurred_at":"2021-03-04T12:05:00Z"}
"#;

#[test]
fn create_then_rename_lands_on_final_name_with_no_errors() {
    let mut conn = load(HAPPY_PATH);

    let report = reconcile_all(&mut conn).expect("reconcile");
    assert!(report.success(), "errors: {:?}", report.errors);
    assert_eq!(report.migrated, 1);

    let rows =
        query::authorships_for_owner(&conn, OwnerRef::work_version(10)).expect("authorships");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].display_name, "Jane Doe");
    assert_eq!(rows[0].given_name, "Jane");
    assert!(!rows[0].system_authored);
    assert!(!rows[0].deleted);
}

#[test]
fn rerun_neither_duplicates_rows_nor_audit_entries() {
    let mut conn = load(HAPPY_PATH);

    reconcile_all(&mut conn).expect("first run");
    let audit_after_first: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM change_events WHERE subject_type = 'authorship'",
            [],
            |row| row.get(0),
        )
        .expect("count");

    let second = reconcile_all(&mut conn).expect("second run");
    assert_eq!(second.migrated, 0);
    assert_eq!(second.skipped, 1);

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM authorships", [], |row| row.get(0))
        .expect("count");
    assert_eq!(rows, 1);

    let audit_after_second: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM change_events WHERE subject_type = 'authorship'",
            [],
            |row| row.get(0),
        )
        .expect("count");
    assert_eq!(audit_after_first, audit_after_second);
}

#[test]
fn carry_forward_uses_live_position_and_marks_system_authored() {
    // Version 2 of a work: its creator list was copied on creation without
    // events, and the author sits at position 5 today.
    let dump = r#"
{"type":"actor","id":1,"given_name":"Jane","surname":"Doe","email":"jane@example.edu"}
{"type":"work","id":5}
{"type":"work_version","id":11,"work_id":5,"version_number":2,"title":"Dataset v2"}
{"type":"creator_link","id":110,"subject_type":"work_version_creator_link","parent_id":11,"actor_id":1,"display_name":"Jane Doe","position":5}
"#;
    let mut conn = load(dump);

    let report = reconcile_all(&mut conn).expect("reconcile");
    assert!(report.success());
    assert_eq!(report.migrated, 1);

    let rows =
        query::authorships_for_owner(&conn, OwnerRef::work_version(11)).expect("authorships");
    assert_eq!(rows.len(), 1);
    assert!(rows[0].system_authored);
    assert_eq!(rows[0].position, 5);
    assert_eq!(rows[0].display_name, "Jane Doe");

    // System writes leave the change log untouched.
    let audit: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM change_events WHERE subject_type = 'authorship'",
            [],
            |row| row.get(0),
        )
        .expect("count");
    assert_eq!(audit, 0);
}

#[test]
fn first_version_gap_reports_one_error_and_spares_siblings() {
    let dump = r#"
{"type":"actor","id":1,"given_name":"Jane","surname":"Doe","email":""}
{"type":"actor","id":2,"given_name":"Ada","surname":"Lovelace","email":""}
{"type":"work","id":5}
{"type":"work_version","id":10,"work_id":5,"version_number":1,"title":"Dataset"}
{"type":"change_event","subject_type":"work_version_creator_link","subject_id":100,"parent_id":10,"kind":"updated","actor_ref":"actor:1","delta":{"display_name":["a","b"]},"occurred_at":1000}
{"type":"change_event","subject_type":"work_version_creator_link","subject_id":101,"parent_id":10,"kind":"created","actor_ref":"actor:2","snapshot":{"actor_id":2,"position":2},"occurred_at":2000}
"#;
    let mut conn = load(dump);

    let report = reconcile_all(&mut conn).expect("reconcile");
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("E2001"));
    assert_eq!(report.migrated, 1);

    let rows =
        query::authorships_for_owner(&conn, OwnerRef::work_version(10)).expect("authorships");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].actor_id, Some(2));
}

#[test]
fn replay_order_follows_timestamps_not_insertion() {
    // The rename is imported before the creation but carries a later
    // timestamp; replay must still end on the renamed value.
    let dump = r#"
{"type":"actor","id":1,"given_name":"Jane","surname":"Doe","email":""}
{"type":"work","id":5}
{"type":"work_version","id":10,"work_id":5,"version_number":1,"title":"Dataset"}
{"type":"change_event","subject_type":"work_version_creator_link","subject_id":100,"parent_id":10,"kind":"updated","actor_ref":"actor:1","delta":{"display_name":["Jane","Jane Doe"]},"occurred_at":2000}
{"type":"change_event","subject_type":"work_version_creator_link","subject_id":100,"parent_id":10,"kind":"created","actor_ref":"actor:1","snapshot":{"actor_id":1,"display_name":"Jane","position":1},"occurred_at":1000}
"#;
    let mut conn = load(dump);

    let report = reconcile_all(&mut conn).expect("reconcile");
    assert!(report.success(), "errors: {:?}", report.errors);

    let rows =
        query::authorships_for_owner(&conn, OwnerRef::work_version(10)).expect("authorships");
    assert_eq!(rows[0].display_name, "Jane Doe");
}

#[test]
fn reordering_events_changes_the_outcome() {
    // Negative control for the ordering guarantee: the same two renames
    // with swapped timestamps must settle on a different final name,
    // because update replay is last-writer-wins.
    fn dump(first_us: i64, second_us: i64) -> String {
        format!(
            r#"
{{"type":"actor","id":1,"given_name":"Jane","surname":"Doe","email":""}}
{{"type":"work","id":5}}
{{"type":"work_version","id":10,"work_id":5,"version_number":1,"title":"Dataset"}}
{{"type":"change_event","subject_type":"work_version_creator_link","subject_id":100,"parent_id":10,"kind":"created","actor_ref":"actor:1","snapshot":{{"actor_id":1,"display_name":"Jane","position":1}},"occurred_at":1000}}
{{"type":"change_event","subject_type":"work_version_creator_link","subject_id":100,"parent_id":10,"kind":"updated","actor_ref":"actor:1","delta":{{"display_name":["Jane","J. Doe"]}},"occurred_at":{first_us}}}
{{"type":"change_event","subject_type":"work_version_creator_link","subject_id":100,"parent_id":10,"kind":"updated","actor_ref":"actor:1","delta":{{"display_name":["J. Doe","Jane Q. Doe"]}},"occurred_at":{second_us}}}
"#
        )
    }

    let final_name = |dump: String| {
        let mut conn = load(&dump);
        let report = reconcile_all(&mut conn).expect("reconcile");
        assert!(report.success(), "errors: {:?}", report.errors);
        let rows =
            query::authorships_for_owner(&conn, OwnerRef::work_version(10)).expect("authorships");
        rows[0].display_name.clone()
    };

    assert_eq!(final_name(dump(2000, 3000)), "Jane Q. Doe");
    assert_eq!(final_name(dump(3000, 2000)), "J. Doe");
}

#[test]
fn collections_reconcile_like_first_versions() {
    let dump = r#"
{"type":"actor","id":1,"given_name":"Jane","surname":"Doe","email":""}
{"type":"collection","id":20,"title":"Theses"}
{"type":"change_event","subject_type":"collection_creator_link","subject_id":200,"parent_id":20,"kind":"created","actor_ref":"actor:1","snapshot":{"actor_id":1,"position":1},"occurred_at":1000}
"#;
    let mut conn = load(dump);

    let report = reconcile_all(&mut conn).expect("reconcile");
    assert!(report.success());
    assert_eq!(report.migrated, 1);

    let rows =
        query::authorships_for_owner(&conn, OwnerRef::collection(20)).expect("authorships");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].display_name, "Jane Doe");
}

#[test]
fn timeline_reflects_reconciled_store() {
    let dump = r#"
{"type":"actor","id":1,"given_name":"Jane","surname":"Doe","email":""}
{"type":"work","id":5}
{"type":"work_version","id":10,"work_id":5,"version_number":1,"title":"Dataset"}
{"type":"change_event","subject_type":"work_version","subject_id":10,"parent_id":5,"kind":"created","actor_ref":"actor:1","snapshot":{"title":"Dataset"},"occurred_at":1000}
{"type":"change_event","subject_type":"file_membership","subject_id":300,"parent_id":10,"kind":"created","actor_ref":"actor:1","snapshot":{"title":"scan.pdf"},"occurred_at":2000}
{"type":"change_event","subject_type":"work_version","subject_id":10,"parent_id":5,"kind":"updated","actor_ref":"actor:1","delta":{"state":["draft","published"]},"occurred_at":3000}
"#;
    let mut conn = load(dump);
    reconcile_all(&mut conn).expect("reconcile");

    let timeline = Timeline::build(&conn, 5).expect("timeline");
    assert_eq!(timeline.versions.len(), 1);

    let kinds: Vec<String> = timeline.versions[0]
        .entries
        .iter()
        .map(|entry| entry.kind.to_string())
        .collect();
    assert_eq!(kinds, vec!["create", "create", "publish"]);
    assert!(
        timeline.versions[0]
            .entries
            .iter()
            .all(|entry| entry.actor == "Jane Doe")
    );
}
