use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::{ListingError, Result};
use super::types::{ListRequest, ListResponse, ListedObject, ListedPrefix, ListingService};

const TOKEN_PREFIX: &str = "mem-";

#[derive(Debug, Clone)]
struct MemoryObject {
    size: u64,
    last_modified: DateTime<Utc>,
}

enum Listed {
    Prefix(String),
    Object(String, MemoryObject),
}

/// An in-memory listing service, intended primarily for testing.
///
/// Paginates exactly like ListObjectsV2: keys and common prefixes are merged
/// in lexical order and `max_keys` bounds their combined count. Continuation
/// tokens are opaque strings. Every request is recorded.
#[derive(Default)]
pub struct MemoryListingService {
    buckets: RwLock<BTreeMap<String, BTreeMap<String, MemoryObject>>>,
    denied: RwLock<HashSet<String>>,
    requests: Mutex<Vec<ListRequest>>,
    request_count: AtomicUsize,
    latency: Option<Duration>,
}

impl MemoryListingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Create an empty bucket (a no-op if it exists).
    pub fn create_bucket(&self, bucket: &str) {
        self.buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(bucket.to_string())
            .or_default();
    }

    /// Store an object, creating its bucket if needed.
    pub fn put_object(&self, bucket: &str, key: &str, size: u64, last_modified: DateTime<Utc>) {
        self.buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                MemoryObject {
                    size,
                    last_modified,
                },
            );
    }

    /// Remove an object.
    pub fn delete_object(&self, bucket: &str, key: &str) {
        if let Some(objects) = self
            .buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(bucket)
        {
            objects.remove(key);
        }
    }

    /// Answer every request for `bucket` with `AccessDenied`.
    pub fn deny(&self, bucket: &str) {
        self.denied
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bucket.to_string());
    }

    /// Number of requests served so far (including failed ones).
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Every request served so far, in arrival order.
    pub fn requests(&self) -> Vec<ListRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn entries(&self, request: &ListRequest) -> Result<Vec<Listed>> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        let objects = buckets
            .get(&request.bucket)
            .ok_or_else(|| ListingError::NoSuchBucket(request.bucket.clone()))?;

        let prefix = request.prefix.as_deref().unwrap_or("");
        let mut entries = Vec::new();
        for (key, object) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            let split = if request.delimiter.is_empty() {
                None
            } else {
                rest.find(&request.delimiter)
            };
            match split {
                Some(idx) => {
                    let common = format!("{}{}", prefix, &rest[..idx + request.delimiter.len()]);
                    let seen = matches!(entries.last(), Some(Listed::Prefix(last)) if *last == common);
                    if !seen {
                        entries.push(Listed::Prefix(common));
                    }
                }
                None => entries.push(Listed::Object(key.clone(), object.clone())),
            }
        }
        Ok(entries)
    }
}

fn parse_token(token: &str) -> Result<usize> {
    token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| ListingError::Service {
            code: "InvalidArgument".to_string(),
            message: format!("The continuation token provided is incorrect: {}", token),
        })
}

#[async_trait]
impl ListingService for MemoryListingService {
    async fn list_objects(&self, request: &ListRequest) -> Result<ListResponse> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self
            .denied
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&request.bucket)
        {
            return Err(ListingError::AccessDenied {
                bucket: request.bucket.clone(),
                message: "Access Denied".to_string(),
            });
        }

        let entries = self.entries(request)?;
        let start = match &request.continuation_token {
            Some(token) => parse_token(token)?,
            None => 0,
        };
        let end = (start + request.max_keys.max(1)).min(entries.len());
        let truncated = end < entries.len();

        let mut response = ListResponse {
            truncated,
            next_continuation_token: truncated.then(|| format!("{}{}", TOKEN_PREFIX, end)),
            ..ListResponse::default()
        };
        for entry in entries.into_iter().take(end).skip(start) {
            match entry {
                Listed::Prefix(prefix) => response.common_prefixes.push(ListedPrefix {
                    prefix: Some(prefix),
                }),
                Listed::Object(key, object) => response.contents.push(ListedObject {
                    key: Some(key),
                    last_modified: Some(object.last_modified),
                    size: Some(object.size as i64),
                }),
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::DELIMITER;

    fn request(prefix: Option<&str>, max_keys: usize, token: Option<String>) -> ListRequest {
        ListRequest {
            bucket: "b".to_string(),
            prefix: prefix.map(str::to_string),
            max_keys,
            delimiter: DELIMITER.to_string(),
            continuation_token: token,
        }
    }

    fn mtime() -> DateTime<Utc> {
        DateTime::from_timestamp(1_600_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn test_groups_keys_under_common_prefixes() {
        let service = MemoryListingService::new();
        service.put_object("b", "a/1", 10, mtime());
        service.put_object("b", "a/2", 20, mtime());
        service.put_object("b", "b/c/3", 5, mtime());
        service.put_object("b", "top", 3, mtime());

        let page = service.list_objects(&request(None, 100, None)).await.unwrap();

        let prefixes: Vec<_> = page.common_prefixes.iter().map(|p| p.prefix.clone().unwrap()).collect();
        assert_eq!(prefixes, vec!["a/", "b/"]);
        assert_eq!(page.contents.len(), 1);
        assert_eq!(page.contents[0].key.as_deref(), Some("top"));
        assert!(!page.truncated);

        let nested = service.list_objects(&request(Some("b/"), 100, None)).await.unwrap();
        assert_eq!(nested.common_prefixes[0].prefix.as_deref(), Some("b/c/"));
        assert!(nested.contents.is_empty());
    }

    #[tokio::test]
    async fn test_pages_chain_through_tokens() {
        let service = MemoryListingService::new();
        for name in ["f1", "f2", "f3"] {
            service.put_object("b", name, 1, mtime());
        }

        let first = service.list_objects(&request(None, 2, None)).await.unwrap();
        assert_eq!(first.contents.len(), 2);
        assert!(first.truncated);

        let second = service
            .list_objects(&request(None, 2, first.next_continuation_token.clone()))
            .await
            .unwrap();
        assert_eq!(second.contents.len(), 1);
        assert_eq!(second.contents[0].key.as_deref(), Some("f3"));
        assert!(!second.truncated);
        assert!(second.next_continuation_token.is_none());

        assert_eq!(service.request_count(), 2);
        assert_eq!(service.requests()[1].continuation_token, first.next_continuation_token);
    }

    #[tokio::test]
    async fn test_failures() {
        let service = MemoryListingService::new();
        let missing = service.list_objects(&request(None, 2, None)).await;
        assert_eq!(missing, Err(ListingError::NoSuchBucket("b".to_string())));

        service.create_bucket("b");
        let bad_token = service
            .list_objects(&request(None, 2, Some("garbage".to_string())))
            .await;
        assert!(matches!(bad_token, Err(ListingError::Service { .. })));

        service.deny("b");
        let denied = service.list_objects(&request(None, 2, None)).await.unwrap_err();
        assert!(denied.is_access_denied());
    }
}
