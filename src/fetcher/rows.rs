//! Typed listing rows and normalization of raw service output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::listing::{ListResponse, ListedObject, ListedPrefix, DELIMITER};

use super::error::{FetchError, Result};
use super::metadata::{LastModified, Metadata};

/// An object in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

/// A common prefix in a listing, i.e. a subdirectory.
///
/// `prefix` is the full key of the directory without its trailing delimiter.
/// `last_modified` and `size` are only filled in when the directory's
/// aggregate is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dir {
    pub prefix: String,
    #[serde(default, skip_serializing_if = "LastModified::is_unknown")]
    pub last_modified: LastModified,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Dir {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            last_modified: LastModified::Unknown,
            size: None,
        }
    }

    /// Attach a computed aggregate.
    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.last_modified = metadata.last_modified;
        self.size = Some(metadata.total_size);
        self
    }

    /// The last path component.
    pub fn name(&self) -> &str {
        basename(&self.prefix)
    }
}

impl File {
    /// The last path component.
    pub fn name(&self) -> &str {
        basename(&self.key)
    }
}

fn basename(path: &str) -> &str {
    path.rsplit(DELIMITER).next().unwrap_or(path)
}

/// A listing row. A row is a directory iff it carries a `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Row {
    Dir(Dir),
    File(File),
}

impl Row {
    pub fn name(&self) -> &str {
        match self {
            Row::Dir(dir) => dir.name(),
            Row::File(file) => file.name(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Row::Dir(_))
    }
}

/// One page of a listing: directories, then files, then where to continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub dirs: Vec<Dir>,
    pub files: Vec<File>,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

impl Page {
    /// Normalize one raw response.
    pub fn from_listing(response: ListResponse) -> Result<Self> {
        let dirs = response
            .common_prefixes
            .into_iter()
            .map(dir_from_listing)
            .collect::<Result<Vec<_>>>()?;
        let files = response
            .contents
            .into_iter()
            .map(file_from_listing)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            dirs,
            files,
            truncated: response.truncated,
            continuation_token: response.next_continuation_token,
        })
    }

    /// Number of rows (directories and files).
    pub fn len(&self) -> usize {
        self.dirs.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows in display order: directories first.
    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        self.dirs
            .iter()
            .cloned()
            .map(Row::Dir)
            .chain(self.files.iter().cloned().map(Row::File))
    }
}

pub fn file_from_listing(object: ListedObject) -> Result<File> {
    match (object.key, object.last_modified, object.size) {
        (Some(key), Some(last_modified), Some(size)) if size >= 0 => Ok(File {
            key,
            last_modified,
            size: size as u64,
        }),
        (key, last_modified, size) => Err(FetchError::MalformedRecord(format!(
            "object missing required field(s): key {:?}, last modified {:?}, size {:?}",
            key, last_modified, size
        ))),
    }
}

pub fn dir_from_listing(prefix: ListedPrefix) -> Result<Dir> {
    let prefix = prefix.prefix.ok_or_else(|| {
        FetchError::MalformedRecord("common prefix missing its prefix".to_string())
    })?;
    let trimmed = prefix.strip_suffix(DELIMITER).unwrap_or(&prefix);
    Ok(Dir::new(trimmed))
}
