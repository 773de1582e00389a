//! Persistent storage for listing caches.
//!
//! ## Architecture
//!
//! 1. **KeyValueStore** - Low-level string key-value storage interface
//!    - [`LmdbKeyValueStore`] - LMDB-backed implementation
//!    - [`MemoryKeyValueStore`] - In-memory implementation with an optional byte quota
//!    - [`NoopKeyValueStore`] - Remembers nothing
//!
//! 2. **CacheRepo** - Per-scope [`Cache`](crate::fetcher::Cache) entries on top of a store

mod cache_repo;
mod key_value_store;
mod lmdb_key_value_store;

pub use cache_repo::CacheRepo;
pub use key_value_store::{
    KeyValueStore, KeyValueStoreError, MemoryKeyValueStore, NoopKeyValueStore,
    Result as KeyValueStoreResult,
};
pub use lmdb_key_value_store::{LmdbKeyValueStore, DEFAULT_MAP_SIZE};
