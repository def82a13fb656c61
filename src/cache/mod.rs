//! Memoizing cache with round-based eviction.
//!
//! Every entry carries the time it was last seen valid. Entries that were not
//! revalidated for two polling rounds describe state nobody checks anymore
//! (a closed pull request, a branch tip that moved), so [`Cache::purge`]
//! drops them.
//!
//! Two storages share the eviction logic:
//! - [`MemoryStorage`] for a single process.
//! - [`FileStorage`], persisted to disk and guarded by an advisory lock. A
//!   process that cannot take the lock works read-only: `set` still returns a
//!   freshly timestamped entry but nothing is stored.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod file;
pub mod fsync;
pub mod interpreter;
pub mod memory;

pub use file::FileStorage;
pub use interpreter::CachingHost;
pub use memory::MemoryStorage;

/// A cached value and the last time it was seen valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_seen: DateTime<Utc>,
    pub value: Value,
}

/// Errors from persistent cache storage.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Backing store of a [`Cache`].
pub trait Storage {
    fn entry(&self, key: &str) -> Option<&CacheEntry>;

    fn insert(&mut self, key: String, entry: CacheEntry);

    fn remove(&mut self, key: &str) -> Option<CacheEntry>;

    fn keys(&self) -> Vec<String>;

    /// Returns false when writes must be dropped.
    fn is_writable(&self) -> bool {
        true
    }

    /// Makes previous writes durable.
    fn flush(&mut self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// A key/value cache over some [`Storage`].
#[derive(Debug)]
pub struct Cache<S> {
    storage: S,
    ttl: Duration,
}

/// Cache living in process memory.
pub type MemoryCache = Cache<MemoryStorage>;

/// Cache persisted to disk.
pub type FileCache = Cache<FileStorage>;

impl MemoryCache {
    pub fn in_memory(ttl: Duration) -> Self {
        Cache::new(MemoryStorage::default(), ttl)
    }
}

impl FileCache {
    /// Opens the cache stored at `path`, read-only if another process holds
    /// its lock.
    pub fn open(path: impl Into<std::path::PathBuf>, ttl: Duration) -> Result<Self, CacheError> {
        Ok(Cache::new(FileStorage::open(path)?, ttl))
    }
}

impl<S: Storage> Cache<S> {
    pub fn new(storage: S, ttl: Duration) -> Self {
        Cache { storage, ttl }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn is_writable(&self) -> bool {
        self.storage.is_writable()
    }

    /// Returns the value stored under `key`, marking it as seen now.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&mut self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        let Some(entry) = self.storage.entry(key) else {
            debug!(key, "Cache miss");
            return None;
        };
        debug!(key, "Cache hit");
        let value = entry.value.clone();
        if self.storage.is_writable() {
            self.storage.insert(
                key.to_string(),
                CacheEntry {
                    last_seen: now,
                    value: value.clone(),
                },
            );
        }
        Some(value)
    }

    /// Stores `value` under `key` and returns the timestamped entry.
    ///
    /// On read-only storage nothing is stored, but the returned entry is
    /// still stamped with the current time.
    pub fn set(&mut self, key: &str, value: Value) -> CacheEntry {
        self.set_at(key, value, Utc::now())
    }

    pub fn set_at(&mut self, key: &str, value: Value, now: DateTime<Utc>) -> CacheEntry {
        let entry = CacheEntry {
            last_seen: now,
            value,
        };
        if self.storage.is_writable() {
            self.storage.insert(key.to_string(), entry.clone());
        }
        entry
    }

    /// Drops entries not seen during the last two rounds, then flushes.
    ///
    /// Returns the number of dropped entries.
    pub fn purge(&mut self) -> Result<usize, CacheError> {
        self.purge_at(Utc::now())
    }

    pub fn purge_at(&mut self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let limit = now.checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut cleaned = 0;
        if self.storage.is_writable() {
            for key in self.storage.keys() {
                let stale = self
                    .storage
                    .entry(&key)
                    .is_some_and(|entry| entry.last_seen <= limit);
                if stale {
                    self.storage.remove(&key);
                    cleaned += 1;
                }
            }
        }

        if cleaned > 0 {
            debug!(cleaned, "Cleaned stale cache keys");
        }
        self.storage.flush()?;
        Ok(cleaned)
    }
}
