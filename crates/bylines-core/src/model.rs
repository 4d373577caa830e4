//! Row types for the normalized target tables and the legacy live state.

use crate::event::{DeltaMap, Field, FieldMap, OwnerRef, SubjectType, value_i64, value_text};
use serde::Serialize;
use serde_json::Value;

/// A normalized authorship row: one author's association with one owning
/// aggregate, the target of the migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Authorship {
    /// Primary key; `None` until inserted.
    pub id: Option<i64>,
    /// The owning work version or collection.
    pub owner: OwnerRef,
    /// Canonical identity reference; `None` for orphaned authorships.
    pub actor_id: Option<i64>,
    /// Display name snapshot, mutable independently of the actor.
    pub display_name: String,
    /// Given name snapshot.
    pub given_name: String,
    /// Surname snapshot.
    pub surname: String,
    /// Email snapshot.
    pub email: String,
    /// Ordering rank among co-authors (ascending = display order).
    pub position: i64,
    /// True when this row was created by the replay engine directly rather
    /// than by replaying a genuine user-driven event. Such writes emit no
    /// audit entry.
    pub system_authored: bool,
    /// Soft-delete marker set by replaying a `deleted` event.
    pub deleted: bool,
}

impl Authorship {
    /// Seed a fresh authorship from a resolved actor's identity fields.
    #[must_use]
    pub fn seeded_from_actor(actor: &crate::actor::Actor, owner: OwnerRef) -> Self {
        Self {
            id: None,
            owner,
            actor_id: Some(actor.id),
            display_name: actor.display_name(),
            given_name: actor.given_name.clone(),
            surname: actor.surname.clone(),
            email: actor.email.clone(),
            position: 0,
            system_authored: false,
            deleted: false,
        }
    }

    /// Synthesize an authorship from the present-day state of a live
    /// creator link, used when the originating `created` event never made
    /// it into the change log (later versions only).
    #[must_use]
    pub fn from_live_link(
        link: &CreatorLink,
        actor: Option<&crate::actor::Actor>,
        owner: OwnerRef,
    ) -> Self {
        let mut authorship = Self {
            id: None,
            owner,
            actor_id: Some(link.actor_id),
            display_name: link.display_name.clone(),
            given_name: String::new(),
            surname: String::new(),
            email: String::new(),
            position: link.position,
            system_authored: true,
            deleted: false,
        };
        if let Some(actor) = actor {
            authorship.given_name = actor.given_name.clone();
            authorship.surname = actor.surname.clone();
            authorship.email = actor.email.clone();
            if authorship.display_name.is_empty() {
                authorship.display_name = actor.display_name();
            }
        }
        authorship
    }

    /// Merge a full snapshot's values over the current state.
    pub fn apply_snapshot(&mut self, snapshot: &FieldMap) {
        for (field, value) in snapshot.iter() {
            self.apply_value(field, value);
        }
    }

    /// Apply the new side of each delta pair over the current state.
    pub fn apply_delta(&mut self, delta: &DeltaMap) {
        for (field, change) in delta.iter() {
            self.apply_value(field, &change.new);
        }
    }

    fn apply_value(&mut self, field: Field, value: &Value) {
        match field {
            Field::DisplayName => self.display_name = value_text(value),
            Field::GivenName => self.given_name = value_text(value),
            Field::Surname => self.surname = value_text(value),
            Field::Email => self.email = value_text(value),
            Field::Position => {
                if let Some(position) = value_i64(value) {
                    self.position = position;
                }
            }
            Field::ActorId => self.actor_id = value_i64(value),
            Field::Id | Field::CreatedAt | Field::UpdatedAt => {}
            other => {
                tracing::debug!(field = %other, "ignoring field not tracked on authorships");
            }
        }
    }

    /// Full field snapshot of the current state, used when emitting the
    /// audit entry for a replayed write.
    #[must_use]
    pub fn to_snapshot(&self) -> FieldMap {
        let mut snapshot = FieldMap::new();
        snapshot.set(Field::DisplayName, Value::String(self.display_name.clone()));
        snapshot.set(Field::GivenName, Value::String(self.given_name.clone()));
        snapshot.set(Field::Surname, Value::String(self.surname.clone()));
        snapshot.set(Field::Email, Value::String(self.email.clone()));
        snapshot.set(Field::Position, Value::from(self.position));
        snapshot.set(
            Field::ActorId,
            self.actor_id.map_or(Value::Null, Value::from),
        );
        snapshot
    }
}

/// Present-day state of a legacy creator association row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatorLink {
    /// Primary key; matches `ChangeEvent::subject_id` for its events.
    pub link_id: i64,
    /// Which creator-link table this row belongs to.
    pub subject_type: SubjectType,
    /// Owning aggregate id.
    pub parent_id: i64,
    /// Canonical identity reference.
    pub actor_id: i64,
    /// Current display name.
    pub display_name: String,
    /// Current ordering rank.
    pub position: i64,
}

/// One version of a deposited work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkVersion {
    /// Primary key.
    pub version_id: i64,
    /// Owning work.
    pub work_id: i64,
    /// 1-based version ordinal within the work.
    pub version_number: u32,
    /// Current title.
    pub title: String,
    /// Current lifecycle state.
    pub state: String,
}

/// A curated collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    /// Primary key.
    pub collection_id: i64,
    /// Current title.
    pub title: String,
}
