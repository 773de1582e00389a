//! Scope-keyed persistence of listing caches.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::fetcher::{Cache, Scope};

use super::key_value_store::{KeyValueStore, KeyValueStoreError};

/// Reads and writes [`Cache`] values in a [`KeyValueStore`], one entry per
/// scope under [`Scope::cache_key`].
///
/// Read failures and undecodable entries are treated as misses. Callers that
/// go through [`CacheRepo::persist`] never see write failures either: the
/// in-memory state stays authoritative and the write is dropped with a
/// warning.
#[derive(Clone)]
pub struct CacheRepo {
    store: Arc<dyn KeyValueStore>,
}

impl CacheRepo {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, scope: &Scope) -> Option<Cache> {
        let raw = match self.store.get(&scope.cache_key()) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(%scope, error = %e, "failed to read cache entry");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(%scope, error = %e, "ignoring undecodable cache entry");
                None
            }
        }
    }

    pub fn put(&self, scope: &Scope, cache: &Cache) -> Result<(), KeyValueStoreError> {
        let json = serde_json::to_string(cache)
            .map_err(|e| KeyValueStoreError::Database(e.to_string()))?;
        self.store.set(&scope.cache_key(), &json)
    }

    pub fn remove(&self, scope: &Scope) -> Result<(), KeyValueStoreError> {
        self.store.remove(&scope.cache_key())
    }

    /// Write `cache`, or delete the entry when there is none.
    pub fn persist(&self, scope: &Scope, cache: Option<&Cache>) {
        let result = match cache {
            Some(cache) => self.put(scope, cache),
            None => self.remove(scope),
        };
        if let Err(e) = result {
            warn!(%scope, error = %e, "dropping cache write");
        }
    }

    /// Load the entry for `scope`, discarding it if it has outlived `ttl` or
    /// was paged with a different page size.
    pub fn load_fresh(
        &self,
        scope: &Scope,
        ttl: Duration,
        page_size: usize,
        now: DateTime<Utc>,
    ) -> Option<Cache> {
        let cache = self.get(scope)?;
        if cache.is_expired(ttl, now) {
            info!(%scope, fetched_at = %cache.timestamp, "discarding expired cache");
            self.persist(scope, None);
            return None;
        }
        if cache.page_size.is_some_and(|size| size != page_size) {
            debug!(
                %scope,
                cached = ?cache.page_size,
                page_size,
                "discarding cache paged with a different page size"
            );
            self.persist(scope, None);
            return None;
        }
        Some(cache)
    }

    /// Every scope with a stored entry, in key order.
    pub fn scopes(&self) -> Vec<Scope> {
        match self.store.keys("") {
            Ok(keys) => keys
                .iter()
                .filter_map(|key| Scope::from_cache_key(key))
                .collect(),
            Err(e) => {
                warn!(error = %e, "failed to list cache entries");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caches::MemoryKeyValueStore;
    use crate::fetcher::{apply, CacheEvent, Page};

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn sample_cache(at: i64, page_size: usize) -> Cache {
        let page = Page {
            dirs: vec![],
            files: vec![],
            truncated: false,
            continuation_token: None,
        };
        apply(
            None,
            CacheEvent::PageFetched {
                index: 0,
                page,
                fetched_at: ts(at),
                page_size,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip_and_removal() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let repo = CacheRepo::new(store.clone());
        let scope = Scope::new("b", Some("x"));

        assert_eq!(repo.get(&scope), None);
        let cache = sample_cache(100, 2);
        repo.persist(&scope, Some(&cache));
        assert_eq!(repo.get(&scope), Some(cache));
        assert!(store.get(r#"{"bucket":"b","key":"x"}"#).unwrap().is_some());

        repo.persist(&scope, None);
        assert_eq!(repo.get(&scope), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_undecodable_entry_is_a_miss() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store.set(r#"{"bucket":"b"}"#, "{not json").unwrap();
        let repo = CacheRepo::new(store);
        assert_eq!(repo.get(&Scope::root("b")), None);
    }

    #[test]
    fn test_load_fresh_drops_expired_entries() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let repo = CacheRepo::new(store.clone());
        let scope = Scope::root("b");
        repo.persist(&scope, Some(&sample_cache(100, 2)));

        let ttl = Duration::seconds(10);
        assert!(repo.load_fresh(&scope, ttl, 2, ts(110)).is_some());
        assert!(repo.load_fresh(&scope, ttl, 2, ts(111)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_fresh_drops_other_page_size() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let repo = CacheRepo::new(store.clone());
        let scope = Scope::root("b");
        repo.persist(&scope, Some(&sample_cache(100, 2)));

        assert!(repo.load_fresh(&scope, Duration::days(1), 3, ts(100)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_write_failure_is_dropped() {
        let store = Arc::new(MemoryKeyValueStore::with_capacity(8));
        let repo = CacheRepo::new(store.clone());
        let scope = Scope::root("b");

        repo.persist(&scope, Some(&sample_cache(100, 2)));
        assert_eq!(repo.get(&scope), None);
        assert!(repo.put(&scope, &sample_cache(100, 2)).is_err());
    }

    #[test]
    fn test_scopes() {
        let repo = CacheRepo::new(Arc::new(MemoryKeyValueStore::new()));
        repo.persist(&Scope::root("b"), Some(&sample_cache(1, 2)));
        repo.persist(&Scope::new("b", Some("x")), Some(&sample_cache(1, 2)));
        assert_eq!(
            repo.scopes(),
            vec![Scope::root("b"), Scope::new("b", Some("x"))]
        );
    }
}
