//! Change-log data model.
//!
//! This module defines [`ChangeEvent`], the typed view of one row in the
//! append-only `change_events` table, plus the closed enums for its tag
//! columns and the typed snapshot/delta payloads.
//!
//! # Ordering
//!
//! Events for the same subject must replay in ascending `occurred_at_us`
//! order. Wall-clock ties are broken by `seq`, the storage sequence number
//! (SQLite rowid), which makes ordering deterministic instead of leaning on
//! incidental retrieval order.

pub mod fields;
pub mod kind;
pub mod subject;

pub use fields::{
    DeltaMap, Field, FieldChange, FieldMap, PayloadShapeError, UnknownFieldKey, value_i64,
    value_text,
};
pub use kind::{EventKind, UnknownEventKind};
pub use subject::{OwnerRef, OwnerType, SubjectType, UnknownSubjectType};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One entry in the append-only change log.
///
/// The change log is read-only input to the replay engine; the only writer
/// is the audit-append path for replayed authorship writes (see
/// [`crate::store::query::WriteOrigin`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    /// Monotonic storage sequence number; the tie-break for equal
    /// `occurred_at_us`.
    pub seq: i64,

    /// Which legacy table this event describes.
    pub subject_type: SubjectType,

    /// Primary key of the legacy record the event describes.
    pub subject_id: i64,

    /// Primary key of the owning aggregate (work version or collection).
    pub parent_id: i64,

    /// The verb recorded by this entry.
    pub kind: EventKind,

    /// Opaque reference to whoever made the change (`actor:<id>`,
    /// `app:<name>`), absent for some legacy rows.
    pub actor_ref: Option<String>,

    /// Full field values at event time; present for `created`/`deleted`.
    pub snapshot: Option<FieldMap>,

    /// Per-field (old, new) pairs; present for `updated`.
    pub delta: Option<DeltaMap>,

    /// Event timestamp, microseconds since the Unix epoch.
    pub occurred_at_us: i64,
}

impl ChangeEvent {
    /// The event timestamp as RFC3339 text, falling back to the raw
    /// microsecond count when out of range.
    #[must_use]
    pub fn occurred_at_rfc3339(&self) -> String {
        DateTime::<Utc>::from_timestamp_micros(self.occurred_at_us)
            .map_or_else(|| self.occurred_at_us.to_string(), |ts| ts.to_rfc3339())
    }

    /// The actor id this event pins down, if any.
    ///
    /// Looks in the snapshot first, then at the new side of the delta.
    #[must_use]
    pub fn actor_id(&self) -> Option<i64> {
        if let Some(snapshot) = &self.snapshot {
            if let Some(value) = snapshot.get(Field::ActorId) {
                if let Some(id) = value_i64(value) {
                    return Some(id);
                }
            }
        }
        self.delta
            .as_ref()
            .and_then(|delta| delta.get(Field::ActorId))
            .and_then(|change| value_i64(&change.new))
    }

    /// Ordering key: `(occurred_at_us, seq)` ascending.
    #[must_use]
    pub const fn order_key(&self) -> (i64, i64) {
        (self.occurred_at_us, self.seq)
    }
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\t{} {}#{}\tparent={}",
            self.occurred_at_rfc3339(),
            self.kind,
            self.subject_type,
            self.subject_id,
            self.parent_id,
        )
    }
}
