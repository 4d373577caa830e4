//! Query and write surface over the bylines store.
//!
//! Reads return typed rows ([`ChangeEvent`], [`CreatorLink`], ...) with the
//! string tag columns parsed into their closed enums. All event queries
//! order by `(occurred_at_us, seq)` so replay and timeline construction
//! never depend on incidental retrieval order.
//!
//! Authorship writes take an explicit [`WriteOrigin`]: replayed writes
//! append an `authorship`-subject audit entry under the original actor
//! reference, system writes suppress audit emission entirely. That
//! suppression is what keeps a re-run of the migration from appending to
//! its own input.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::event::{ChangeEvent, DeltaMap, EventKind, FieldMap, OwnerRef, SubjectType};
use crate::model::{Authorship, Collection, CreatorLink, WorkVersion};

// ---------------------------------------------------------------------------
// Change-event reads
// ---------------------------------------------------------------------------

const EVENT_COLUMNS: &str =
    "seq, subject_type, subject_id, parent_id, kind, actor_ref, snapshot, delta, occurred_at_us";

struct RawEventRow {
    seq: i64,
    subject_type: String,
    subject_id: i64,
    parent_id: i64,
    kind: String,
    actor_ref: Option<String>,
    snapshot: Option<String>,
    delta: Option<String>,
    occurred_at_us: i64,
}

fn raw_event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEventRow> {
    Ok(RawEventRow {
        seq: row.get(0)?,
        subject_type: row.get(1)?,
        subject_id: row.get(2)?,
        parent_id: row.get(3)?,
        kind: row.get(4)?,
        actor_ref: row.get(5)?,
        snapshot: row.get(6)?,
        delta: row.get(7)?,
        occurred_at_us: row.get(8)?,
    })
}

fn event_from_raw(raw: RawEventRow) -> Result<ChangeEvent> {
    let subject_type: SubjectType = raw
        .subject_type
        .parse()
        .with_context(|| format!("change_events.seq = {}", raw.seq))?;
    let kind: EventKind = raw
        .kind
        .parse()
        .with_context(|| format!("change_events.seq = {}", raw.seq))?;

    let snapshot = raw
        .snapshot
        .as_deref()
        .map(|text| -> Result<FieldMap> {
            let value: serde_json::Value = serde_json::from_str(text)
                .with_context(|| format!("snapshot JSON at seq {}", raw.seq))?;
            FieldMap::from_json(&value).with_context(|| format!("snapshot shape at seq {}", raw.seq))
        })
        .transpose()?;

    let delta = raw
        .delta
        .as_deref()
        .map(|text| -> Result<DeltaMap> {
            let value: serde_json::Value = serde_json::from_str(text)
                .with_context(|| format!("delta JSON at seq {}", raw.seq))?;
            DeltaMap::from_json(&value).with_context(|| format!("delta shape at seq {}", raw.seq))
        })
        .transpose()?;

    Ok(ChangeEvent {
        seq: raw.seq,
        subject_type,
        subject_id: raw.subject_id,
        parent_id: raw.parent_id,
        kind,
        actor_ref: raw.actor_ref,
        snapshot,
        delta,
        occurred_at_us: raw.occurred_at_us,
    })
}

fn collect_events(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<ChangeEvent>> {
    let mut stmt = conn.prepare(sql).context("prepare change-event query")?;
    let rows = stmt
        .query_map(args, raw_event_from_row)
        .context("run change-event query")?;

    let mut events = Vec::new();
    for row in rows {
        let raw = row.context("read change-event row")?;
        events.push(event_from_raw(raw)?);
    }
    Ok(events)
}

/// All events of one subject type scoped to a parent aggregate, ordered by
/// `(occurred_at_us, seq)` ascending.
///
/// # Errors
///
/// Returns an error if the query fails or a row carries an unknown tag or
/// malformed payload.
pub fn events_for_parent(
    conn: &Connection,
    subject_type: SubjectType,
    parent_id: i64,
) -> Result<Vec<ChangeEvent>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM change_events
         WHERE subject_type = ?1 AND parent_id = ?2
         ORDER BY occurred_at_us ASC, seq ASC"
    );
    collect_events(conn, &sql, &[&subject_type.as_str(), &parent_id])
}

/// All creator-link events owned by an aggregate, ordered.
///
/// # Errors
///
/// Returns an error if the query fails or a row is malformed.
pub fn creator_events_for_parent(conn: &Connection, owner: OwnerRef) -> Result<Vec<ChangeEvent>> {
    events_for_parent(conn, owner.owner_type.creator_subject(), owner.owner_id)
}

/// All events describing one specific record (`subject_type`, `subject_id`),
/// ordered. Used for the version's own field-edit stream.
///
/// # Errors
///
/// Returns an error if the query fails or a row is malformed.
pub fn events_for_subject(
    conn: &Connection,
    subject_type: SubjectType,
    subject_id: i64,
) -> Result<Vec<ChangeEvent>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM change_events
         WHERE subject_type = ?1 AND subject_id = ?2
         ORDER BY occurred_at_us ASC, seq ASC"
    );
    collect_events(conn, &sql, &[&subject_type.as_str(), &subject_id])
}

// ---------------------------------------------------------------------------
// Idempotence probes
// ---------------------------------------------------------------------------

/// Whether an authorship row already exists for `(owner, actor)`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn authorship_exists(conn: &Connection, owner: OwnerRef, actor_id: i64) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM authorships
            WHERE owner_type = ?1 AND owner_id = ?2 AND actor_id = ?3
        )",
        params![owner.owner_type.as_str(), owner.owner_id, actor_id],
        |row| row.get(0),
    )
    .context("authorship existence probe")
}

/// Whether the change log already carries an `authorship`-subject entry
/// referencing this actor for this parent — evidence of a prior replay even
/// if the row itself has since moved.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn authorship_event_exists(conn: &Connection, owner: OwnerRef, actor_id: i64) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM change_events
            WHERE subject_type = ?1 AND parent_id = ?2
              AND json_extract(snapshot, '$.actor_id') = ?3
        )",
        params![SubjectType::Authorship.as_str(), owner.owner_id, actor_id],
        |row| row.get(0),
    )
    .context("authorship change-log probe")
}

// ---------------------------------------------------------------------------
// Live legacy state
// ---------------------------------------------------------------------------

const LINK_COLUMNS: &str = "link_id, subject_type, parent_id, actor_id, display_name, position";

fn link_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(CreatorLink, String)> {
    let subject_type: String = row.get(1)?;
    Ok((
        CreatorLink {
            link_id: row.get(0)?,
            subject_type: SubjectType::WorkVersionCreatorLink, // fixed up by caller
            parent_id: row.get(2)?,
            actor_id: row.get(3)?,
            display_name: row.get(4)?,
            position: row.get(5)?,
        },
        subject_type,
    ))
}

fn finish_link((mut link, tag): (CreatorLink, String)) -> Result<CreatorLink> {
    link.subject_type = tag
        .parse()
        .with_context(|| format!("creator_links.link_id = {}", link.link_id))?;
    Ok(link)
}

/// Present-day creator links attached to an aggregate, ordered by position.
///
/// # Errors
///
/// Returns an error if the query fails or a row carries an unknown tag.
pub fn live_links_for_parent(conn: &Connection, owner: OwnerRef) -> Result<Vec<CreatorLink>> {
    let sql = format!(
        "SELECT {LINK_COLUMNS} FROM creator_links
         WHERE subject_type = ?1 AND parent_id = ?2
         ORDER BY position ASC, link_id ASC"
    );
    let mut stmt = conn.prepare(&sql).context("prepare live-link query")?;
    let rows = stmt
        .query_map(
            params![owner.owner_type.creator_subject().as_str(), owner.owner_id],
            link_from_row,
        )
        .context("run live-link query")?;

    let mut links = Vec::new();
    for row in rows {
        links.push(finish_link(row.context("read live-link row")?)?);
    }
    Ok(links)
}

/// Present-day state of one creator link, if it still exists.
///
/// # Errors
///
/// Returns an error if the query fails or the row carries an unknown tag.
pub fn live_link(conn: &Connection, link_id: i64) -> Result<Option<CreatorLink>> {
    let sql = format!("SELECT {LINK_COLUMNS} FROM creator_links WHERE link_id = ?1");
    let row = conn
        .query_row(&sql, [link_id], link_from_row)
        .optional()
        .context("live-link lookup")?;
    row.map(finish_link).transpose()
}

/// Versions of one work in version order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn work_versions_for_work(conn: &Connection, work_id: i64) -> Result<Vec<WorkVersion>> {
    let mut stmt = conn
        .prepare(
            "SELECT version_id, work_id, version_number, title, state
             FROM work_versions WHERE work_id = ?1
             ORDER BY version_number ASC",
        )
        .context("prepare work-version query")?;
    let rows = stmt
        .query_map([work_id], work_version_from_row)
        .context("run work-version query")?;

    let mut versions = Vec::new();
    for row in rows {
        versions.push(row.context("read work-version row")?);
    }
    Ok(versions)
}

/// Every work version in the store, ordered by work then version.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn all_work_versions(conn: &Connection) -> Result<Vec<WorkVersion>> {
    let mut stmt = conn
        .prepare(
            "SELECT version_id, work_id, version_number, title, state
             FROM work_versions ORDER BY work_id ASC, version_number ASC",
        )
        .context("prepare work-version scan")?;
    let rows = stmt
        .query_map([], work_version_from_row)
        .context("run work-version scan")?;

    let mut versions = Vec::new();
    for row in rows {
        versions.push(row.context("read work-version row")?);
    }
    Ok(versions)
}

fn work_version_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkVersion> {
    let number: i64 = row.get(2)?;
    Ok(WorkVersion {
        version_id: row.get(0)?,
        work_id: row.get(1)?,
        version_number: u32::try_from(number).unwrap_or(1),
        title: row.get(3)?,
        state: row.get(4)?,
    })
}

/// Every collection in the store, ordered by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn all_collections(conn: &Connection) -> Result<Vec<Collection>> {
    let mut stmt = conn
        .prepare("SELECT collection_id, title FROM collections ORDER BY collection_id ASC")
        .context("prepare collection scan")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Collection {
                collection_id: row.get(0)?,
                title: row.get(1)?,
            })
        })
        .context("run collection scan")?;

    let mut collections = Vec::new();
    for row in rows {
        collections.push(row.context("read collection row")?);
    }
    Ok(collections)
}

// ---------------------------------------------------------------------------
// Authorship writes
// ---------------------------------------------------------------------------

/// Who a write is attributed to, and whether it leaves an audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOrigin {
    /// Replaying a genuine historical event: the audit entry is re-emitted
    /// under the original actor reference at the original event time.
    Replayed {
        /// The original event's actor reference.
        actor_ref: Option<String>,
        /// The original event's timestamp.
        occurred_at_us: i64,
    },
    /// The replay engine acting on its own (synthesis, carry-forward):
    /// no audit entry is appended.
    System,
}

fn append_audit(
    conn: &Connection,
    kind: EventKind,
    authorship: &Authorship,
    origin: &WriteOrigin,
    delta: Option<&DeltaMap>,
) -> Result<()> {
    let WriteOrigin::Replayed {
        actor_ref,
        occurred_at_us,
    } = origin
    else {
        return Ok(());
    };

    let authorship_id = authorship
        .id
        .context("audit append requires a persisted authorship")?;

    let snapshot_json = match kind {
        EventKind::Created | EventKind::Deleted => {
            Some(authorship.to_snapshot().to_json().to_string())
        }
        EventKind::Updated => None,
    };
    let delta_json = delta.map(|d| d.to_json().to_string());

    conn.execute(
        "INSERT INTO change_events
            (subject_type, subject_id, parent_id, kind, actor_ref, snapshot, delta, occurred_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            SubjectType::Authorship.as_str(),
            authorship_id,
            authorship.owner.owner_id,
            kind.as_str(),
            actor_ref.as_deref(),
            snapshot_json,
            delta_json,
            occurred_at_us,
        ],
    )
    .context("append authorship audit entry")?;
    Ok(())
}

/// Insert a new authorship row, appending an audit entry for replayed
/// origins. Returns the new primary key.
///
/// # Errors
///
/// Returns an error if the insert or audit append fails (e.g. the unique
/// `(owner, actor)` constraint).
pub fn insert_authorship(
    conn: &Connection,
    authorship: &mut Authorship,
    origin: &WriteOrigin,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO authorships
            (owner_type, owner_id, actor_id, display_name, given_name, surname, email,
             position, system_authored, deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            authorship.owner.owner_type.as_str(),
            authorship.owner.owner_id,
            authorship.actor_id,
            authorship.display_name,
            authorship.given_name,
            authorship.surname,
            authorship.email,
            authorship.position,
            authorship.system_authored,
            authorship.deleted,
        ],
    )
    .with_context(|| format!("insert authorship for {}", authorship.owner))?;

    let id = conn.last_insert_rowid();
    authorship.id = Some(id);
    append_audit(conn, EventKind::Created, authorship, origin, None)?;
    Ok(id)
}

/// Persist the current state of an already-inserted authorship, appending
/// an audit entry (with the applied delta) for replayed origins.
///
/// # Errors
///
/// Returns an error if the update or audit append fails.
pub fn update_authorship(
    conn: &Connection,
    authorship: &Authorship,
    applied: Option<&DeltaMap>,
    origin: &WriteOrigin,
) -> Result<()> {
    let id = authorship
        .id
        .context("update requires a persisted authorship")?;

    conn.execute(
        "UPDATE authorships SET
            actor_id = ?1, display_name = ?2, given_name = ?3, surname = ?4,
            email = ?5, position = ?6, deleted = ?7
         WHERE authorship_id = ?8",
        params![
            authorship.actor_id,
            authorship.display_name,
            authorship.given_name,
            authorship.surname,
            authorship.email,
            authorship.position,
            authorship.deleted,
            id,
        ],
    )
    .with_context(|| format!("update authorship #{id}"))?;

    append_audit(conn, EventKind::Updated, authorship, origin, applied)
}

/// Soft-delete an authorship (the row stays for inspection and idempotence
/// probes), appending an audit entry for replayed origins.
///
/// # Errors
///
/// Returns an error if the update or audit append fails.
pub fn soft_delete_authorship(
    conn: &Connection,
    authorship: &mut Authorship,
    origin: &WriteOrigin,
) -> Result<()> {
    let id = authorship
        .id
        .context("delete requires a persisted authorship")?;

    conn.execute(
        "UPDATE authorships SET deleted = 1 WHERE authorship_id = ?1",
        [id],
    )
    .with_context(|| format!("soft-delete authorship #{id}"))?;

    authorship.deleted = true;
    append_audit(conn, EventKind::Deleted, authorship, origin, None)
}

/// Authorships attached to an owner, ordered by position.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn authorships_for_owner(conn: &Connection, owner: OwnerRef) -> Result<Vec<Authorship>> {
    let mut stmt = conn
        .prepare(
            "SELECT authorship_id, actor_id, display_name, given_name, surname, email,
                    position, system_authored, deleted
             FROM authorships
             WHERE owner_type = ?1 AND owner_id = ?2
             ORDER BY position ASC, authorship_id ASC",
        )
        .context("prepare authorship listing")?;
    let rows = stmt
        .query_map(
            params![owner.owner_type.as_str(), owner.owner_id],
            |row| {
                Ok(Authorship {
                    id: Some(row.get(0)?),
                    owner,
                    actor_id: row.get(1)?,
                    display_name: row.get(2)?,
                    given_name: row.get(3)?,
                    surname: row.get(4)?,
                    email: row.get(5)?,
                    position: row.get(6)?,
                    system_authored: row.get(7)?,
                    deleted: row.get(8)?,
                })
            },
        )
        .context("run authorship listing")?;

    let mut authorships = Vec::new();
    for row in rows {
        authorships.push(row.context("read authorship row")?);
    }
    Ok(authorships)
}
