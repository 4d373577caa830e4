//! Typed views over raw change events for timeline rendering.
//!
//! Each wrapper pins one subject type and refuses construction for any
//! other, so classification logic downstream never has to re-check which
//! table an event came from.

use anyhow::{Result, bail};
use serde::Serialize;

use crate::error::ErrorCode;
use crate::event::{ChangeEvent, EventKind, Field, SubjectType, value_text};

/// What a timeline entry means to a reader, independent of the raw verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Create,
    Rename,
    Update,
    Publish,
    Delete,
}

impl EntryKind {
    /// Presentation label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Rename => "rename",
            Self::Update => "update",
            Self::Publish => "publish",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field's before/after rendering within a timeline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    /// Which field changed.
    pub field: Field,
    /// Rendered old value.
    pub old: String,
    /// Rendered new value.
    pub new: String,
}

fn diffs_from_event(event: &ChangeEvent) -> Vec<FieldDiff> {
    let Some(delta) = &event.delta else {
        return Vec::new();
    };
    delta
        .iter()
        .filter(|(field, _)| !field.is_bookkeeping())
        .map(|(field, change)| FieldDiff {
            field,
            old: value_text(&change.old),
            new: value_text(&change.new),
        })
        .collect()
}

fn delta_moves_to(event: &ChangeEvent, field: Field, target: &str) -> bool {
    event
        .delta
        .as_ref()
        .and_then(|delta| delta.get(field))
        .is_some_and(|change| value_text(&change.new) == target)
}

fn delta_touches(event: &ChangeEvent, field: Field) -> bool {
    event
        .delta
        .as_ref()
        .is_some_and(|delta| delta.touches(field))
}

fn require_subject(event: &ChangeEvent, expected: SubjectType) -> Result<()> {
    if event.subject_type != expected {
        bail!(
            "[{}] expected {expected} event, got {} (seq {})",
            ErrorCode::SubjectTypeMismatch,
            event.subject_type,
            event.seq,
        );
    }
    Ok(())
}

/// An event describing the version record itself.
#[derive(Debug, Clone)]
pub struct VersionChange(ChangeEvent);

impl VersionChange {
    /// Wrap a `work_version` event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event describes any other subject type.
    pub fn new(event: ChangeEvent) -> Result<Self> {
        require_subject(&event, SubjectType::WorkVersion)?;
        Ok(Self(event))
    }

    /// Classify for presentation. A state transition to `published` beats a
    /// title change, which beats a plain update.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self.0.kind {
            EventKind::Created => EntryKind::Create,
            EventKind::Deleted => EntryKind::Delete,
            EventKind::Updated => {
                if delta_moves_to(&self.0, Field::State, "published") {
                    EntryKind::Publish
                } else if delta_touches(&self.0, Field::Title) {
                    EntryKind::Rename
                } else {
                    EntryKind::Update
                }
            }
        }
    }

    /// The wrapped event.
    #[must_use]
    pub fn event(&self) -> &ChangeEvent {
        &self.0
    }

    /// Non-bookkeeping field diffs.
    #[must_use]
    pub fn changed(&self) -> Vec<FieldDiff> {
        diffs_from_event(&self.0)
    }
}

/// An event describing a file attached to the version.
#[derive(Debug, Clone)]
pub struct FileChange(ChangeEvent);

impl FileChange {
    /// Wrap a `file_membership` event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event describes any other subject type.
    pub fn new(event: ChangeEvent) -> Result<Self> {
        require_subject(&event, SubjectType::FileMembership)?;
        Ok(Self(event))
    }

    /// Classify for presentation. A title change on a file reads as a
    /// rename to the depositor.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self.0.kind {
            EventKind::Created => EntryKind::Create,
            EventKind::Deleted => EntryKind::Delete,
            EventKind::Updated => {
                if delta_touches(&self.0, Field::Title) {
                    EntryKind::Rename
                } else {
                    EntryKind::Update
                }
            }
        }
    }

    /// The wrapped event.
    #[must_use]
    pub fn event(&self) -> &ChangeEvent {
        &self.0
    }

    /// Non-bookkeeping field diffs.
    #[must_use]
    pub fn changed(&self) -> Vec<FieldDiff> {
        diffs_from_event(&self.0)
    }
}

/// An event describing a creator link on the version.
#[derive(Debug, Clone)]
pub struct CreatorChange(ChangeEvent);

impl CreatorChange {
    /// Wrap a creator-link event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event describes any other subject type.
    pub fn new(event: ChangeEvent) -> Result<Self> {
        if !event.subject_type.is_creator_link() {
            bail!(
                "[{}] expected creator-link event, got {} (seq {})",
                ErrorCode::SubjectTypeMismatch,
                event.subject_type,
                event.seq,
            );
        }
        Ok(Self(event))
    }

    /// Classify for presentation. A display-name change reads as a rename.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self.0.kind {
            EventKind::Created => EntryKind::Create,
            EventKind::Deleted => EntryKind::Delete,
            EventKind::Updated => {
                if delta_touches(&self.0, Field::DisplayName) {
                    EntryKind::Rename
                } else {
                    EntryKind::Update
                }
            }
        }
    }

    /// The wrapped event.
    #[must_use]
    pub fn event(&self) -> &ChangeEvent {
        &self.0
    }

    /// Non-bookkeeping field diffs.
    #[must_use]
    pub fn changed(&self) -> Vec<FieldDiff> {
        diffs_from_event(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeltaMap, FieldMap};
    use serde_json::json;

    fn event(subject_type: SubjectType, kind: EventKind, delta: Option<serde_json::Value>) -> ChangeEvent {
        ChangeEvent {
            seq: 1,
            subject_type,
            subject_id: 100,
            parent_id: 10,
            kind,
            actor_ref: Some("actor:1".to_string()),
            snapshot: None,
            delta: delta.map(|v| DeltaMap::from_json(&v).expect("delta")),
            occurred_at_us: 1_000,
        }
    }

    #[test]
    fn wrappers_reject_foreign_subjects() {
        let creator = event(SubjectType::WorkVersionCreatorLink, EventKind::Created, None);
        let err = VersionChange::new(creator).expect_err("must fail");
        assert!(err.to_string().contains("E2003"));

        let version = event(SubjectType::WorkVersion, EventKind::Created, None);
        assert!(CreatorChange::new(version).is_err());
    }

    #[test]
    fn publish_beats_rename_beats_update() {
        let publish = VersionChange::new(event(
            SubjectType::WorkVersion,
            EventKind::Updated,
            Some(json!({"state": ["draft", "published"], "title": ["a", "b"]})),
        ))
        .expect("wrap");
        assert_eq!(publish.kind(), EntryKind::Publish);

        let rename = VersionChange::new(event(
            SubjectType::WorkVersion,
            EventKind::Updated,
            Some(json!({"title": ["a", "b"], "description": ["x", "y"]})),
        ))
        .expect("wrap");
        assert_eq!(rename.kind(), EntryKind::Rename);

        let update = VersionChange::new(event(
            SubjectType::WorkVersion,
            EventKind::Updated,
            Some(json!({"description": ["x", "y"]})),
        ))
        .expect("wrap");
        assert_eq!(update.kind(), EntryKind::Update);
    }

    #[test]
    fn state_change_away_from_published_is_not_publish() {
        let change = VersionChange::new(event(
            SubjectType::WorkVersion,
            EventKind::Updated,
            Some(json!({"state": ["published", "withdrawn"]})),
        ))
        .expect("wrap");
        assert_eq!(change.kind(), EntryKind::Update);
    }

    #[test]
    fn creator_display_name_change_is_rename() {
        let rename = CreatorChange::new(event(
            SubjectType::WorkVersionCreatorLink,
            EventKind::Updated,
            Some(json!({"display_name": ["Jane", "Jane Doe"]})),
        ))
        .expect("wrap");
        assert_eq!(rename.kind(), EntryKind::Rename);

        let reorder = CreatorChange::new(event(
            SubjectType::WorkVersionCreatorLink,
            EventKind::Updated,
            Some(json!({"position": [1, 2]})),
        ))
        .expect("wrap");
        assert_eq!(reorder.kind(), EntryKind::Update);
    }

    #[test]
    fn file_title_change_is_rename() {
        let rename = FileChange::new(event(
            SubjectType::FileMembership,
            EventKind::Updated,
            Some(json!({"title": ["scan.pdf", "thesis.pdf"]})),
        ))
        .expect("wrap");
        assert_eq!(rename.kind(), EntryKind::Rename);
    }

    #[test]
    fn created_and_deleted_map_directly() {
        let create = FileChange::new(event(SubjectType::FileMembership, EventKind::Created, None))
            .expect("wrap");
        assert_eq!(create.kind(), EntryKind::Create);

        let delete = FileChange::new(event(SubjectType::FileMembership, EventKind::Deleted, None))
            .expect("wrap");
        assert_eq!(delete.kind(), EntryKind::Delete);
    }

    #[test]
    fn changed_skips_bookkeeping_fields() {
        let change = VersionChange::new(event(
            SubjectType::WorkVersion,
            EventKind::Updated,
            Some(json!({
                "title": ["a", "b"],
                "updated_at": ["2020-01-01", "2020-01-02"]
            })),
        ))
        .expect("wrap");

        let diffs = change.changed();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].field, Field::Title);
        assert_eq!(diffs[0].old, "a");
        assert_eq!(diffs[0].new, "b");
    }

    #[test]
    fn snapshot_only_events_have_no_diffs() {
        let mut raw = event(SubjectType::WorkVersion, EventKind::Created, None);
        raw.snapshot = Some(FieldMap::from_json(&json!({"title": "a"})).expect("snapshot"));
        let change = VersionChange::new(raw).expect("wrap");
        assert!(change.changed().is_empty());
    }
}
