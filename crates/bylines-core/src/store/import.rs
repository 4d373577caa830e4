//! JSONL bulk import into the bylines store.
//!
//! Each input line is one self-describing record tagged by `"type"`:
//! actors, works, work versions, collections, live creator links, and
//! change-log events. The whole file loads inside a single transaction so a
//! malformed line leaves the store untouched.
//!
//! Event payloads (`snapshot`, `delta`) are stored as the verbatim JSON
//! text; shape validation and unknown-key handling happen at read time
//! where the warning can carry replay context.

use anyhow::{Context, Result, bail};
use chrono::DateTime;
use rusqlite::{Connection, params};
use serde::Deserialize;
use std::io::BufRead;

use crate::event::{EventKind, SubjectType};

/// One line of the import file.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportRecord {
    /// Canonical identity record.
    Actor {
        id: i64,
        #[serde(default)]
        given_name: String,
        #[serde(default)]
        surname: String,
        #[serde(default)]
        email: String,
        #[serde(default)]
        orcid: Option<String>,
    },
    /// Work aggregate root.
    Work { id: i64 },
    /// One version of a work.
    WorkVersion {
        id: i64,
        work_id: i64,
        version_number: u32,
        #[serde(default)]
        title: String,
        #[serde(default = "default_state")]
        state: String,
    },
    /// Collection aggregate root.
    Collection {
        id: i64,
        #[serde(default)]
        title: String,
    },
    /// Present-day creator link.
    CreatorLink {
        id: i64,
        subject_type: SubjectType,
        parent_id: i64,
        actor_id: i64,
        #[serde(default)]
        display_name: String,
        #[serde(default)]
        position: i64,
    },
    /// Historical change-log entry.
    ChangeEvent {
        subject_type: SubjectType,
        subject_id: i64,
        parent_id: i64,
        kind: EventKind,
        #[serde(default)]
        actor_ref: Option<String>,
        #[serde(default)]
        snapshot: Option<serde_json::Value>,
        #[serde(default)]
        delta: Option<serde_json::Value>,
        occurred_at: Timestamp,
    },
}

fn default_state() -> String {
    "draft".to_string()
}

/// A point in time accepted either as an RFC 3339 string or as an integer
/// count of microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp(pub i64);

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Micros(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Micros(us) => Ok(Self(us)),
            Raw::Text(text) => {
                let parsed = DateTime::parse_from_rfc3339(&text).map_err(|error| {
                    serde::de::Error::custom(format!("invalid timestamp {text:?}: {error}"))
                })?;
                Ok(Self(parsed.timestamp_micros()))
            }
        }
    }
}

/// Row counts from one import run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub actors: usize,
    pub works: usize,
    pub versions: usize,
    pub collections: usize,
    pub links: usize,
    pub events: usize,
}

impl ImportReport {
    /// Total rows loaded.
    #[must_use]
    pub fn total(&self) -> usize {
        self.actors + self.works + self.versions + self.collections + self.links + self.events
    }
}

/// Load a JSONL stream into the store inside one transaction.
///
/// Dimension records (actors, works, versions, collections, links) use
/// `INSERT OR REPLACE` so re-importing a corrected dump converges. Change
/// events always append; re-running an import over the same event file is
/// not supported and will duplicate history.
///
/// # Errors
///
/// Returns an error (and rolls back everything) if any line fails to parse
/// or any insert fails. The error names the offending line number.
pub fn import_jsonl(conn: &mut Connection, reader: impl BufRead) -> Result<ImportReport> {
    let tx = conn.transaction().context("begin import transaction")?;
    let mut report = ImportReport::default();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("read import line {line_no}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: ImportRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("parse import line {line_no}"))?;
        apply_record(&tx, record, &mut report)
            .with_context(|| format!("load import line {line_no}"))?;
    }

    if report.total() == 0 {
        bail!("import stream contained no records");
    }

    tx.commit().context("commit import transaction")?;
    tracing::info!(
        actors = report.actors,
        works = report.works,
        versions = report.versions,
        collections = report.collections,
        links = report.links,
        events = report.events,
        "import complete"
    );
    Ok(report)
}

fn apply_record(
    conn: &Connection,
    record: ImportRecord,
    report: &mut ImportReport,
) -> Result<()> {
    match record {
        ImportRecord::Actor {
            id,
            given_name,
            surname,
            email,
            orcid,
        } => {
            conn.execute(
                "INSERT OR REPLACE INTO actors (actor_id, given_name, surname, email, orcid)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, given_name, surname, email, orcid],
            )
            .context("insert actor")?;
            report.actors += 1;
        }
        ImportRecord::Work { id } => {
            conn.execute("INSERT OR REPLACE INTO works (work_id) VALUES (?1)", [id])
                .context("insert work")?;
            report.works += 1;
        }
        ImportRecord::WorkVersion {
            id,
            work_id,
            version_number,
            title,
            state,
        } => {
            conn.execute(
                "INSERT OR REPLACE INTO work_versions
                    (version_id, work_id, version_number, title, state)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, work_id, version_number, title, state],
            )
            .context("insert work version")?;
            report.versions += 1;
        }
        ImportRecord::Collection { id, title } => {
            conn.execute(
                "INSERT OR REPLACE INTO collections (collection_id, title) VALUES (?1, ?2)",
                params![id, title],
            )
            .context("insert collection")?;
            report.collections += 1;
        }
        ImportRecord::CreatorLink {
            id,
            subject_type,
            parent_id,
            actor_id,
            display_name,
            position,
        } => {
            if !subject_type.is_creator_link() {
                bail!("creator_link record tagged {subject_type}, expected a creator link type");
            }
            conn.execute(
                "INSERT OR REPLACE INTO creator_links
                    (link_id, subject_type, parent_id, actor_id, display_name, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    subject_type.as_str(),
                    parent_id,
                    actor_id,
                    display_name,
                    position
                ],
            )
            .context("insert creator link")?;
            report.links += 1;
        }
        ImportRecord::ChangeEvent {
            subject_type,
            subject_id,
            parent_id,
            kind,
            actor_ref,
            snapshot,
            delta,
            occurred_at,
        } => {
            conn.execute(
                "INSERT INTO change_events
                    (subject_type, subject_id, parent_id, kind, actor_ref,
                     snapshot, delta, occurred_at_us)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    subject_type.as_str(),
                    subject_id,
                    parent_id,
                    kind.as_str(),
                    actor_ref,
                    snapshot.map(|v| v.to_string()),
                    delta.map(|v| v.to_string()),
                    occurred_at.0,
                ],
            )
            .context("insert change event")?;
            report.events += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;
    use std::io::Cursor;

    fn import(input: &str) -> Result<(Connection, ImportReport)> {
        let mut conn = store::open_in_memory().expect("open in-memory store");
        let report = import_jsonl(&mut conn, Cursor::new(input))?;
        Ok((conn, report))
    }

    #[test]
    fn imports_every_record_type() {
        let input = r#"
{"type":"actor","id":1,"given_name":"Jane","surname":"Doe","email":"jane@example.edu"}
{"type":"work","id":5}
{"type":"work_version","id":10,"work_id":5,"version_number":1,"title":"Dataset"}
{"type":"collection","id":20,"title":"Theses"}
{"type":"creator_link","id":100,"subject_type":"work_version_creator_link","parent_id":10,"actor_id":1,"position":1}
{"type":"change_event","subject_type":"work_version_creator_link","subject_id":100,"parent_id":10,"kind":"created","actor_ref":"actor:1","snapshot":{"actor_id":1},"occurred_at":"2021-03-04T12:00:00Z"}
"#;
        let (conn, report) = import(input).expect("import");
        assert_eq!(report.actors, 1);
        assert_eq!(report.works, 1);
        assert_eq!(report.versions, 1);
        assert_eq!(report.collections, 1);
        assert_eq!(report.links, 1);
        assert_eq!(report.events, 1);
        assert_eq!(report.total(), 6);

        let occurred_at: i64 = conn
            .query_row("SELECT occurred_at_us FROM change_events", [], |row| {
                row.get(0)
            })
            .expect("query");
        // 2021-03-04T12:00:00Z in microseconds.
        assert_eq!(occurred_at, 1_614_859_200_000_000);
    }

    #[test]
    fn accepts_integer_microsecond_timestamps() {
        let input = r#"{"type":"change_event","subject_type":"work_version","subject_id":10,"parent_id":5,"kind":"updated","delta":{"title":["a","b"]},"occurred_at":1614859200000000}"#;
        let (conn, report) = import(input).expect("import");
        assert_eq!(report.events, 1);

        let occurred_at: i64 = conn
            .query_row("SELECT occurred_at_us FROM change_events", [], |row| {
                row.get(0)
            })
            .expect("query");
        assert_eq!(occurred_at, 1_614_859_200_000_000);
    }

    #[test]
    fn malformed_line_rolls_back_everything() {
        let input = "{\"type\":\"actor\",\"id\":1}\nnot json\n";
        let err = import(input).expect_err("must fail");
        assert!(err.to_string().contains("line 2"), "got: {err:#}");
    }

    #[test]
    fn rejects_non_link_subject_on_creator_link() {
        let input = r#"{"type":"creator_link","id":1,"subject_type":"work_version","parent_id":1,"actor_id":1}"#;
        assert!(import(input).is_err());
    }

    #[test]
    fn empty_stream_is_an_error() {
        let err = import("\n\n").expect_err("must fail");
        assert!(err.to_string().contains("no records"));
    }

    #[test]
    fn reimport_of_dimension_rows_converges() {
        let mut conn = store::open_in_memory().expect("open in-memory store");
        let line = r#"{"type":"actor","id":1,"given_name":"Jane","surname":"Doe"}"#;
        import_jsonl(&mut conn, Cursor::new(line)).expect("first import");
        let corrected = r#"{"type":"actor","id":1,"given_name":"Janet","surname":"Doe"}"#;
        import_jsonl(&mut conn, Cursor::new(corrected)).expect("second import");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM actors", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
        let given: String = conn
            .query_row("SELECT given_name FROM actors", [], |row| row.get(0))
            .expect("query");
        assert_eq!(given, "Janet");
    }
}
