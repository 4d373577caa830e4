//! Version-history timelines for works.
//!
//! A work's timeline is one section per version. Within a section, three
//! pre-ordered event streams (the version record's own edits, its file
//! events, its creator-link events) merge into a single list ordered by
//! `(occurred_at_us, seq)`. Actor references resolve to display names
//! through a [`NameCache`] shared across the whole build, so one depositor
//! editing every version costs one lookup.

pub mod diff;
pub mod entry;

pub use diff::metadata_diff;
pub use entry::{CreatorChange, EntryKind, FieldDiff, FileChange, VersionChange};

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;

use crate::actor::NameCache;
use crate::event::{ChangeEvent, SubjectType};
use crate::model::WorkVersion;
use crate::store::query;

/// One rendered timeline line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Reader-facing classification.
    pub kind: EntryKind,
    /// Which table the underlying event described.
    pub subject_type: SubjectType,
    /// Primary key of the described record.
    pub subject_id: i64,
    /// Resolved display name of whoever made the change.
    pub actor: String,
    /// Event time, RFC 3339.
    pub occurred_at: String,
    /// Non-bookkeeping field diffs, empty for snapshot-only events.
    pub changed: Vec<FieldDiff>,
}

/// All timeline entries for one version.
#[derive(Debug, Clone, Serialize)]
pub struct VersionTimeline {
    /// The version the entries belong to.
    pub version: WorkVersion,
    /// Merged entries, oldest first.
    pub entries: Vec<HistoryEntry>,
}

/// Full history of a work, one section per version in version order.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    /// Work primary key.
    pub work_id: i64,
    /// Per-version sections.
    pub versions: Vec<VersionTimeline>,
}

impl Timeline {
    /// Build the timeline for every version of a work.
    ///
    /// # Errors
    ///
    /// Returns an error if the work has no versions, a query fails, or an
    /// event row is malformed.
    pub fn build(conn: &Connection, work_id: i64) -> Result<Self> {
        let versions = query::work_versions_for_work(conn, work_id)?;
        if versions.is_empty() {
            anyhow::bail!("work #{work_id} has no versions");
        }

        let mut names = NameCache::new();
        let mut sections = Vec::with_capacity(versions.len());
        for version in versions {
            let entries = build_version_entries(conn, &version, &mut names)
                .with_context(|| format!("build timeline for version #{}", version.version_id))?;
            sections.push(VersionTimeline { version, entries });
        }

        Ok(Self {
            work_id,
            versions: sections,
        })
    }
}

fn build_version_entries(
    conn: &Connection,
    version: &WorkVersion,
    names: &mut NameCache,
) -> Result<Vec<HistoryEntry>> {
    let version_entries =
        query::events_for_subject(conn, SubjectType::WorkVersion, version.version_id)?
            .into_iter()
            .map(|event| {
                let change = VersionChange::new(event)?;
                Ok(to_entry(conn, names, change.kind(), change.changed(), change.event()))
            })
            .collect::<Result<Vec<_>>>()?;

    let file_entries =
        query::events_for_parent(conn, SubjectType::FileMembership, version.version_id)?
            .into_iter()
            .map(|event| {
                let change = FileChange::new(event)?;
                Ok(to_entry(conn, names, change.kind(), change.changed(), change.event()))
            })
            .collect::<Result<Vec<_>>>()?;

    let creator_entries = query::events_for_parent(
        conn,
        SubjectType::WorkVersionCreatorLink,
        version.version_id,
    )?
    .into_iter()
    .map(|event| {
        let change = CreatorChange::new(event)?;
        Ok(to_entry(conn, names, change.kind(), change.changed(), change.event()))
    })
    .collect::<Result<Vec<_>>>()?;

    Ok(merge_ordered(vec![
        version_entries,
        file_entries,
        creator_entries,
    ]))
}

type KeyedEntry = ((i64, i64), HistoryEntry);

fn to_entry(
    conn: &Connection,
    names: &mut NameCache,
    kind: EntryKind,
    changed: Vec<FieldDiff>,
    event: &ChangeEvent,
) -> KeyedEntry {
    (
        event.order_key(),
        HistoryEntry {
            kind,
            subject_type: event.subject_type,
            subject_id: event.subject_id,
            actor: names.resolve(conn, event.actor_ref.as_deref()),
            occurred_at: event.occurred_at_rfc3339(),
            changed,
        },
    )
}

/// Merge already-sorted streams into one list ordered by `(time, seq)`.
/// Ties across streams resolve by picking the earliest stream, which cannot
/// happen for real rows since `seq` is unique store-wide.
fn merge_ordered(streams: Vec<Vec<KeyedEntry>>) -> Vec<HistoryEntry> {
    let total: usize = streams.iter().map(Vec::len).sum();
    let mut iters: Vec<_> = streams
        .into_iter()
        .map(|stream| stream.into_iter().peekable())
        .collect();

    let mut merged = Vec::with_capacity(total);
    loop {
        let next = iters
            .iter_mut()
            .filter_map(|iter| iter.peek().map(|(key, _)| *key))
            .min();
        let Some(key) = next else { break };

        for iter in &mut iters {
            if iter.peek().is_some_and(|(k, _)| *k == key) {
                if let Some((_, entry)) = iter.next() {
                    merged.push(entry);
                }
                break;
            }
        }
    }
    merged
}
