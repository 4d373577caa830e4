//! Closed subject-type and owner-type tags.
//!
//! The change log records which legacy table an event describes via a
//! `subject_type` string column. Modeling the tag as an enum keeps dispatch
//! exhaustive: adding a subject type is a compile error at every match site
//! instead of a silently ignored string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which tracked record a change-log entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectType {
    /// Legacy creator association on a work version.
    WorkVersionCreatorLink,
    /// Legacy creator association on a collection.
    CollectionCreatorLink,
    /// File attachment membership on a work version.
    FileMembership,
    /// The work version record itself (title, description, state, ...).
    WorkVersion,
    /// A normalized authorship row written by the replay engine.
    Authorship,
}

/// Error returned when parsing an unknown subject-type string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "unknown subject type '{raw}': expected one of work_version_creator_link, \
     collection_creator_link, file_membership, work_version, authorship"
)]
pub struct UnknownSubjectType {
    /// The unrecognised input string.
    pub raw: String,
}

impl SubjectType {
    /// All known subject types.
    pub const ALL: [Self; 5] = [
        Self::WorkVersionCreatorLink,
        Self::CollectionCreatorLink,
        Self::FileMembership,
        Self::WorkVersion,
        Self::Authorship,
    ];

    /// Return the canonical column-value string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorkVersionCreatorLink => "work_version_creator_link",
            Self::CollectionCreatorLink => "collection_creator_link",
            Self::FileMembership => "file_membership",
            Self::WorkVersion => "work_version",
            Self::Authorship => "authorship",
        }
    }

    /// Whether events of this type describe a creator association.
    #[must_use]
    pub const fn is_creator_link(self) -> bool {
        matches!(
            self,
            Self::WorkVersionCreatorLink | Self::CollectionCreatorLink
        )
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectType {
    type Err = UnknownSubjectType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work_version_creator_link" => Ok(Self::WorkVersionCreatorLink),
            "collection_creator_link" => Ok(Self::CollectionCreatorLink),
            "file_membership" => Ok(Self::FileMembership),
            "work_version" => Ok(Self::WorkVersion),
            "authorship" => Ok(Self::Authorship),
            _ => Err(UnknownSubjectType { raw: s.to_string() }),
        }
    }
}

impl Serialize for SubjectType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SubjectType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Which aggregate owns an authorship: a work version or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerType {
    /// One version of a deposited work.
    WorkVersion,
    /// A curated collection.
    Collection,
}

impl OwnerType {
    /// Return the canonical column-value string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorkVersion => "work_version",
            Self::Collection => "collection",
        }
    }

    /// The creator-link subject type owned by this aggregate.
    #[must_use]
    pub const fn creator_subject(self) -> SubjectType {
        match self {
            Self::WorkVersion => SubjectType::WorkVersionCreatorLink,
            Self::Collection => SubjectType::CollectionCreatorLink,
        }
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerType {
    type Err = UnknownSubjectType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work_version" => Ok(Self::WorkVersion),
            "collection" => Ok(Self::Collection),
            _ => Err(UnknownSubjectType { raw: s.to_string() }),
        }
    }
}

impl Serialize for OwnerType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OwnerType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A fully qualified reference to an owning aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Which table the owner lives in.
    pub owner_type: OwnerType,
    /// Primary key of the owner row.
    pub owner_id: i64,
}

impl OwnerRef {
    /// Reference a work version by id.
    #[must_use]
    pub const fn work_version(id: i64) -> Self {
        Self {
            owner_type: OwnerType::WorkVersion,
            owner_id: id,
        }
    }

    /// Reference a collection by id.
    #[must_use]
    pub const fn collection(id: i64) -> Self {
        Self {
            owner_type: OwnerType::Collection,
            owner_id: id,
        }
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.owner_type, self.owner_id)
    }
}
