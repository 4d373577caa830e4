//! Event kind enum covering the three change-log verbs.
//!
//! Every row in the change log records exactly one of `created`, `updated`,
//! or `deleted` against a tracked record. The string representation matches
//! the values stored in the `kind` column.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three verbs a change-log entry can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The record was created; `snapshot` holds its initial field values.
    Created,
    /// One or more fields changed; `delta` holds (old, new) pairs.
    Updated,
    /// The record was removed; `snapshot` holds its final field values.
    Deleted,
}

/// Error returned when parsing an unknown event kind string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind '{raw}': expected one of created, updated, deleted")]
pub struct UnknownEventKind {
    /// The unrecognised input string.
    pub raw: String,
}

impl EventKind {
    /// All known kinds in verb order.
    pub const ALL: [Self; 3] = [Self::Created, Self::Updated, Self::Deleted];

    /// Return the canonical column-value string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            _ => Err(UnknownEventKind { raw: s.to_string() }),
        }
    }
}

// Custom serde: serialize as the bare verb string.
impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_all_kinds() {
        let expected = [
            (EventKind::Created, "created"),
            (EventKind::Updated, "updated"),
            (EventKind::Deleted, "deleted"),
        ];
        for (kind, s) in expected {
            assert_eq!(kind.to_string(), s);
            assert_eq!(kind.as_str(), s);
        }
    }

    #[test]
    fn fromstr_roundtrip() {
        for kind in EventKind::ALL {
            let parsed: EventKind = kind.as_str().parse().expect("should parse");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn fromstr_rejects_unknown() {
        let err = "destroyed".parse::<EventKind>().unwrap_err();
        assert_eq!(err.raw, "destroyed");
        assert!(err.to_string().contains("expected one of"));
    }

    #[test]
    fn serde_uses_bare_verb() {
        let json = serde_json::to_string(&EventKind::Updated).expect("serialize");
        assert_eq!(json, "\"updated\"");
        let deser: EventKind = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(deser, EventKind::Updated);
    }
}
