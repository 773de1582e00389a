//! Per-scope listing cache and its state transitions.
//!
//! [`apply`] is the whole state machine: it maps the current cache and an
//! event to the next cache, with no I/O. Persisting the result is the
//! caller's job.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::metadata::{LastModified, Metadata};
use super::rows::{Dir, Page};
use super::scope::Scope;

/// Everything known about one scope's listing.
///
/// `pages[i]` is only populated once page `i` has been fetched. `num_children`
/// is set once the final page has been fetched. `timestamp` is the fetch time
/// of the oldest page. The aggregate fields stay absent until a metadata
/// computation fills them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cache {
    pub pages: Vec<Option<Page>>,
    pub timestamp: DateTime<Utc>,
    /// Page size the pages were fetched with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    /// Direct children (directories and files) at this level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_children: Option<u64>,
    /// Files at any depth below this level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_descendants: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(default, skip_serializing_if = "LastModified::is_unknown")]
    pub last_modified: LastModified,
}

/// Something that happened to a scope's cache.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    PageFetched {
        index: usize,
        page: Page,
        fetched_at: DateTime<Utc>,
        page_size: usize,
    },
    MetadataComputed(Metadata),
    Expired,
    Cleared,
}

impl Cache {
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index).and_then(Option::as_ref)
    }

    /// Expired once strictly more than `ttl` has passed since the oldest page was fetched.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.timestamp + ttl < now
    }

    /// Whether every page of this level has been fetched.
    pub fn is_fully_paged(&self) -> bool {
        self.num_children.is_some()
    }

    /// The stored aggregate, if all of it is known.
    pub fn metadata(&self) -> Option<Metadata> {
        match (self.num_descendants, self.total_size, self.last_modified) {
            (Some(num_children), Some(total_size), last_modified) if !last_modified.is_unknown() => {
                Some(Metadata {
                    num_children,
                    total_size,
                    last_modified,
                })
            }
            _ => None,
        }
    }

    /// Whether storing `metadata` would change anything.
    pub fn metadata_differs(&self, metadata: &Metadata) -> bool {
        self.num_descendants != Some(metadata.num_children)
            || self.total_size != Some(metadata.total_size)
            || self.last_modified != metadata.last_modified
    }

    /// All fetched subdirectories, in listing order.
    pub fn dirs(&self) -> impl Iterator<Item = &Dir> {
        self.pages.iter().flatten().flat_map(|page| page.dirs.iter())
    }

    /// Scopes of all subdirectories, or `None` until the level is fully paged.
    pub fn child_scopes(&self, scope: &Scope) -> Option<Vec<Scope>> {
        self.is_fully_paged()
            .then(|| self.dirs().map(|dir| scope.child(&dir.prefix)).collect())
    }

    /// All pages in order, or `None` if any is missing.
    pub fn complete_pages(&self) -> Option<Vec<&Page>> {
        self.pages.iter().map(Option::as_ref).collect()
    }
}

/// Compute the cache that results from `event`.
pub fn apply(state: Option<Cache>, event: CacheEvent) -> Option<Cache> {
    match event {
        CacheEvent::PageFetched {
            index,
            page,
            fetched_at,
            page_size,
        } => {
            let mut cache = state.unwrap_or_else(|| Cache {
                pages: Vec::new(),
                timestamp: fetched_at,
                page_size: Some(page_size),
                num_children: None,
                num_descendants: None,
                total_size: None,
                last_modified: LastModified::Unknown,
            });
            if fetched_at < cache.timestamp {
                cache.timestamp = fetched_at;
            }
            if !page.truncated {
                cache.num_children = Some((index * page_size + page.len()) as u64);
            }
            if cache.pages.len() <= index {
                cache.pages.resize(index + 1, None);
            }
            cache.pages[index] = Some(page);
            Some(cache)
        }
        CacheEvent::MetadataComputed(metadata) => state.map(|mut cache| {
            cache.num_descendants = Some(metadata.num_children);
            cache.total_size = Some(metadata.total_size);
            cache.last_modified = metadata.last_modified;
            cache
        }),
        CacheEvent::Expired | CacheEvent::Cleared => None,
    }
}
