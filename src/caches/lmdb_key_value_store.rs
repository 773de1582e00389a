//! LMDB-based key-value store implementation.
//!
//! Uses the heed crate to provide a persistent store backed by LMDB. The map
//! size bounds how much can be cached; writes past it fail.
//!
//! LMDB limits keys to 511 bytes, while cache keys embed object keys of up to
//! 1024 bytes. Entries are therefore stored under the SHA-256 of their key,
//! and the value records the original key next to the stored string.

use std::path::Path;

use heed::types::Str;
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::key_value_store::{KeyValueStore, KeyValueStoreError, Result};

/// Default LMDB map size (1GB).
pub const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024;

fn db_err(e: heed::Error) -> KeyValueStoreError {
    match e {
        heed::Error::Mdb(heed::MdbError::MapFull) => {
            KeyValueStoreError::QuotaExceeded("LMDB map is full".to_string())
        }
        other => KeyValueStoreError::Database(other.to_string()),
    }
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    value: String,
}

impl StoredEntry {
    fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| KeyValueStoreError::Database(format!("undecodable entry: {}", e)))
    }
}

/// The LMDB key an entry is stored under.
fn digest_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// An LMDB-backed key-value store.
pub struct LmdbKeyValueStore {
    env: Env,
    db: Database<Str, Str>,
}

impl LmdbKeyValueStore {
    /// Open (or create) a store at the given directory.
    pub fn new(path: &Path, map_size: usize) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per path by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path)
                .map_err(db_err)?
        };

        let mut wtxn = env.write_txn().map_err(db_err)?;
        let db: Database<Str, Str> = env.create_database(&mut wtxn, None).map_err(db_err)?;
        wtxn.commit().map_err(db_err)?;

        Ok(Self { env, db })
    }
}

impl KeyValueStore for LmdbKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let rtxn = self.env.read_txn().map_err(db_err)?;
        match self.db.get(&rtxn, &digest_key(key)).map_err(db_err)? {
            Some(raw) => {
                let entry = StoredEntry::decode(raw)?;
                Ok((entry.key == key).then_some(entry.value))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let entry = StoredEntry {
            key: key.to_string(),
            value: value.to_string(),
        };
        let raw = serde_json::to_string(&entry)
            .map_err(|e| KeyValueStoreError::Database(e.to_string()))?;
        let mut wtxn = self.env.write_txn().map_err(db_err)?;
        self.db.put(&mut wtxn, &digest_key(key), &raw).map_err(db_err)?;
        wtxn.commit().map_err(db_err)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut wtxn = self.env.write_txn().map_err(db_err)?;
        self.db.delete(&mut wtxn, &digest_key(key)).map_err(db_err)?;
        wtxn.commit().map_err(db_err)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let rtxn = self.env.read_txn().map_err(db_err)?;
        let mut keys = Vec::new();
        for entry in self.db.iter(&rtxn).map_err(db_err)? {
            let (_, raw) = entry.map_err(db_err)?;
            let entry = StoredEntry::decode(raw)?;
            if entry.key.starts_with(prefix) {
                keys.push(entry.key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
