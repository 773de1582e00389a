//! Recursive listing aggregates and how they combine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::rows::File;

/// What is known about the newest modification time under a directory.
///
/// Variants are ordered `Unknown < Empty < At(_)` (and `At` by time), and
/// combining two values takes the maximum: unknown is absorbed by anything
/// known, an empty directory is absorbed by any real timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LastModified {
    /// Not computed yet.
    #[default]
    Unknown,
    /// Computed, and there is nothing underneath to have a timestamp.
    Empty,
    /// The newest modification time.
    At(DateTime<Utc>),
}

impl LastModified {
    pub fn combine(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, LastModified::Unknown)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            LastModified::At(ts) => Some(*ts),
            LastModified::Unknown | LastModified::Empty => None,
        }
    }
}

// Persisted as: field absent = Unknown, `null` = Empty, timestamp = At.
// Fields of this type must be `#[serde(default, skip_serializing_if = "LastModified::is_unknown")]`.
impl Serialize for LastModified {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LastModified::At(ts) => serializer.serialize_some(ts),
            LastModified::Unknown | LastModified::Empty => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for LastModified {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<DateTime<Utc>>::deserialize(deserializer)? {
            Some(ts) => LastModified::At(ts),
            None => LastModified::Empty,
        })
    }
}

/// Aggregate over everything beneath a directory, descendants included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Number of files beneath the directory, at any depth.
    pub num_children: u64,
    /// Sum of those files' sizes.
    pub total_size: u64,
    #[serde(skip_serializing_if = "LastModified::is_unknown")]
    pub last_modified: LastModified,
}

impl Metadata {
    /// The identity for [`Metadata::combine`].
    pub const IDENTITY: Metadata = Metadata {
        num_children: 0,
        total_size: 0,
        last_modified: LastModified::Unknown,
    };

    /// The aggregate of a directory with nothing in it.
    pub const EMPTY_DIR: Metadata = Metadata {
        num_children: 0,
        total_size: 0,
        last_modified: LastModified::Empty,
    };

    pub fn for_file(file: &File) -> Self {
        Self {
            num_children: 1,
            total_size: file.size,
            last_modified: LastModified::At(file.last_modified),
        }
    }

    /// Associative, commutative merge of two partial aggregates.
    pub fn combine(self, other: Self) -> Self {
        Self {
            num_children: self.num_children + other.num_children,
            total_size: self.total_size + other.total_size,
            last_modified: self.last_modified.combine(other.last_modified),
        }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::IDENTITY
    }
}
