//! Typed field keys and payload maps for change-log entries.
//!
//! The upstream audit log stored snapshots and deltas as free-form JSON
//! objects. Here every key must be one of the known [`Field`] variants;
//! unknown keys are logged and dropped at parse time instead of flowing
//! through the engine untyped.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The closed set of field names a change-log payload may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// Author display name as shown on the record.
    DisplayName,
    /// Author given name.
    GivenName,
    /// Author surname.
    Surname,
    /// Author contact email.
    Email,
    /// Ordering rank among co-authors (ascending = display order).
    Position,
    /// Foreign reference to the canonical identity record.
    ActorId,
    /// Title of a work version or display title of a file.
    Title,
    /// Work version subtitle.
    Subtitle,
    /// Work version description/abstract.
    Description,
    /// Work version publication date.
    PublishedDate,
    /// Work version lifecycle state (`draft`, `published`, `withdrawn`).
    State,
    /// Underlying filename of a file membership.
    Filename,
    /// Row primary key (bookkeeping).
    Id,
    /// Row creation timestamp (bookkeeping).
    CreatedAt,
    /// Row update timestamp (bookkeeping).
    UpdatedAt,
}

/// Error returned when a payload key is not a known [`Field`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field key '{raw}'")]
pub struct UnknownFieldKey {
    /// The unrecognised key.
    pub raw: String,
}

impl Field {
    /// All known fields in declaration order.
    pub const ALL: [Self; 15] = [
        Self::DisplayName,
        Self::GivenName,
        Self::Surname,
        Self::Email,
        Self::Position,
        Self::ActorId,
        Self::Title,
        Self::Subtitle,
        Self::Description,
        Self::PublishedDate,
        Self::State,
        Self::Filename,
        Self::Id,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];

    /// Canonical snake_case key as stored in payload JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DisplayName => "display_name",
            Self::GivenName => "given_name",
            Self::Surname => "surname",
            Self::Email => "email",
            Self::Position => "position",
            Self::ActorId => "actor_id",
            Self::Title => "title",
            Self::Subtitle => "subtitle",
            Self::Description => "description",
            Self::PublishedDate => "published_date",
            Self::State => "state",
            Self::Filename => "filename",
            Self::Id => "id",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    /// Human-readable label for timeline rendering.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DisplayName => "Display name",
            Self::GivenName => "Given name",
            Self::Surname => "Surname",
            Self::Email => "Email",
            Self::Position => "Position",
            Self::ActorId => "Author identity",
            Self::Title => "Title",
            Self::Subtitle => "Subtitle",
            Self::Description => "Description",
            Self::PublishedDate => "Published date",
            Self::State => "State",
            Self::Filename => "Filename",
            Self::Id => "Id",
            Self::CreatedAt => "Created at",
            Self::UpdatedAt => "Updated at",
        }
    }

    /// Internal bookkeeping fields are excluded from changed-field listings.
    #[must_use]
    pub const fn is_bookkeeping(self) -> bool {
        matches!(self, Self::Id | Self::CreatedAt | Self::UpdatedAt)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = UnknownFieldKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for field in Self::ALL {
            if field.as_str() == s {
                return Ok(field);
            }
        }
        Err(UnknownFieldKey { raw: s.to_string() })
    }
}

impl Serialize for Field {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Error returned when a payload JSON value has the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadShapeError {
    /// The payload root was not a JSON object.
    #[error("payload must be a JSON object, got {got}")]
    NotAnObject {
        /// Short description of what was found instead.
        got: String,
    },
    /// A delta entry was not a two-element `[old, new]` array.
    #[error("delta for '{field}' must be a two-element [old, new] array")]
    BadDeltaPair {
        /// The offending field key.
        field: String,
    },
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a payload value as display text.
///
/// Strings render bare (no quotes); null renders empty; everything else
/// renders as compact JSON.
#[must_use]
pub fn value_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interpret a payload value as an integer, accepting numeric strings.
#[must_use]
pub fn value_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// FieldMap — full snapshot payload
// ---------------------------------------------------------------------------

/// A full field snapshot: every tracked field's value at event time.
///
/// Backed by a `BTreeMap` so iteration (and therefore serialization and
/// audit re-emission) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap(BTreeMap<Field, Value>);

impl FieldMap {
    /// Empty snapshot.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parse a snapshot from its JSON column value.
    ///
    /// Unknown keys are logged at `warn` and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadShapeError::NotAnObject`] if `value` is not an object.
    pub fn from_json(value: &Value) -> Result<Self, PayloadShapeError> {
        let Value::Object(map) = value else {
            return Err(PayloadShapeError::NotAnObject {
                got: json_kind(value).to_string(),
            });
        };

        let mut out = BTreeMap::new();
        for (key, val) in map {
            match key.parse::<Field>() {
                Ok(field) => {
                    out.insert(field, val.clone());
                }
                Err(_) => {
                    tracing::warn!(key = %key, "dropping unknown snapshot field");
                }
            }
        }
        Ok(Self(out))
    }

    /// Serialize back to the JSON column shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (field, value) in &self.0 {
            map.insert(field.as_str().to_string(), value.clone());
        }
        Value::Object(map)
    }

    /// Set a field value.
    pub fn set(&mut self, field: Field, value: Value) {
        self.0.insert(field, value);
    }

    /// Look up a field value.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&Value> {
        self.0.get(&field)
    }

    /// Iterate fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &Value)> {
        self.0.iter().map(|(f, v)| (*f, v))
    }

    /// Number of fields present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no fields are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FieldMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// DeltaMap — per-field (old, new) pairs
// ---------------------------------------------------------------------------

/// One field's change: old value and new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Value before the event (null for `created` entries).
    pub old: Value,
    /// Value after the event.
    pub new: Value,
}

/// A change delta: (old, new) pairs keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaMap(BTreeMap<Field, FieldChange>);

impl DeltaMap {
    /// Empty delta.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parse a delta from its JSON column value: `{"field": [old, new]}`.
    ///
    /// Unknown keys are logged at `warn` and dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not an object or any entry is not a
    /// two-element array.
    pub fn from_json(value: &Value) -> Result<Self, PayloadShapeError> {
        let Value::Object(map) = value else {
            return Err(PayloadShapeError::NotAnObject {
                got: json_kind(value).to_string(),
            });
        };

        let mut out = BTreeMap::new();
        for (key, val) in map {
            let field = match key.parse::<Field>() {
                Ok(field) => field,
                Err(_) => {
                    tracing::warn!(key = %key, "dropping unknown delta field");
                    continue;
                }
            };
            let Value::Array(pair) = val else {
                return Err(PayloadShapeError::BadDeltaPair { field: key.clone() });
            };
            if pair.len() != 2 {
                return Err(PayloadShapeError::BadDeltaPair { field: key.clone() });
            }
            out.insert(
                field,
                FieldChange {
                    old: pair[0].clone(),
                    new: pair[1].clone(),
                },
            );
        }
        Ok(Self(out))
    }

    /// Serialize back to the JSON column shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (field, change) in &self.0 {
            map.insert(
                field.as_str().to_string(),
                Value::Array(vec![change.old.clone(), change.new.clone()]),
            );
        }
        Value::Object(map)
    }

    /// Record a change for a field.
    pub fn set(&mut self, field: Field, old: Value, new: Value) {
        self.0.insert(field, FieldChange { old, new });
    }

    /// Look up the change for a field.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&FieldChange> {
        self.0.get(&field)
    }

    /// Whether the delta touches a field.
    #[must_use]
    pub fn touches(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    /// Iterate changes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldChange)> {
        self.0.iter().map(|(f, c)| (*f, c))
    }

    /// Fields touched by this delta, bookkeeping excluded, in key order.
    pub fn changed_fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.keys().copied().filter(|f| !f.is_bookkeeping())
    }

    /// Number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the delta is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for DeltaMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
