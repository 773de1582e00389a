//! Key-value store trait and the in-process implementations.
//!
//! The store is synchronous and string-keyed: listing caches are read and
//! written from non-suspending code paths.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during key-value store operations.
#[derive(Debug, Error)]
pub enum KeyValueStoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error (e.g., from LMDB).
    #[error("database error: {0}")]
    Database(String),

    /// The store has no room for the write.
    #[error("store full: {0}")]
    QuotaExceeded(String),
}

/// Result type for key-value store operations.
pub type Result<T> = std::result::Result<T, KeyValueStoreError>;

// =============================================================================
// KeyValueStore Trait
// =============================================================================

/// A persistent string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Get the value for a key, returning `None` if not found.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a key to a value, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`, in lexical order.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

// =============================================================================
// MemoryKeyValueStore
// =============================================================================

/// An in-memory store, optionally bounded like browser storage is.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse writes that would make keys plus values exceed `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            capacity: Some(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(capacity) = self.capacity {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = used + key.len() + value.len();
            if needed > capacity {
                return Err(KeyValueStoreError::QuotaExceeded(format!(
                    "{needed} bytes needed, {capacity} bytes capacity"
                )));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

// =============================================================================
// NoopKeyValueStore
// =============================================================================

/// A store that remembers nothing; used when caching is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKeyValueStore;

impl KeyValueStore for NoopKeyValueStore {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn keys(&self, _prefix: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_basic_operations() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v2".to_string()));

        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_keys_by_prefix() {
        let store = MemoryKeyValueStore::new();
        store.set(r#"{"bucket":"a"}"#, "1").unwrap();
        store.set(r#"{"bucket":"a","key":"x"}"#, "2").unwrap();
        store.set(r#"{"bucket":"b"}"#, "3").unwrap();

        let keys = store.keys(r#"{"bucket":"a""#).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(store.keys("").unwrap().len(), 3);
    }

    #[test]
    fn test_memory_capacity() {
        let store = MemoryKeyValueStore::with_capacity(10);
        store.set("ab", "cdef").unwrap();
        // replacing an entry only counts the new value
        store.set("ab", "cdefgh").unwrap();

        let err = store.set("xy", "zzzz").unwrap_err();
        assert!(matches!(err, KeyValueStoreError::QuotaExceeded(_)));
        assert_eq!(store.get("xy").unwrap(), None);
    }

    #[test]
    fn test_noop_forgets() {
        let store = NoopKeyValueStore;
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        assert!(store.keys("").unwrap().is_empty());
    }
}
