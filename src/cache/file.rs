//! Disk-backed cache storage.
//!
//! Entries live in memory and are written to a JSON store on flush and on
//! drop. A companion `.lock` file is locked exclusively for the lifetime of
//! the storage; when another process already holds it, the storage opens
//! read-only and never writes.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info, warn};

use super::fsync::{sibling, write_atomic};
use super::{CacheEntry, CacheError, Storage};

#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    /// Held while the storage is writable.
    lock: Option<File>,
    dirty: bool,
}

impl FileStorage {
    /// Opens the store at `path`, creating parent directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let lock_path = sibling(&path, ".lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&lock_path)?;
        let lock = match lock_file.try_lock_exclusive() {
            Ok(()) => Some(lock_file),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Cache is locked by another process, opening read-only"
                );
                None
            }
        };

        let entries = load(&path)?;
        debug!(path = %path.display(), entries = entries.len(), writable = lock.is_some(), "Opened cache");

        Ok(FileStorage {
            path,
            entries,
            lock,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&mut self) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(&self.entries)?;
        write_atomic(&self.path, &bytes)?;
        self.dirty = false;
        Ok(())
    }
}

fn load(path: &Path) -> Result<BTreeMap<String, CacheEntry>, CacheError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice(&bytes) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            // A store we cannot read only costs us a cold cache.
            warn!(path = %path.display(), error = %e, "Discarding unreadable cache");
            Ok(BTreeMap::new())
        }
    }
}

impl Storage for FileStorage {
    fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: String, entry: CacheEntry) {
        if self.lock.is_some() {
            self.entries.insert(key, entry);
            self.dirty = true;
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        if self.lock.is_none() {
            return None;
        }
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn is_writable(&self) -> bool {
        self.lock.is_some()
    }

    fn flush(&mut self) -> Result<(), CacheError> {
        if self.lock.is_some() && self.dirty {
            self.persist()?;
        }
        Ok(())
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "Failed to save cache");
        }
        if let Some(lock) = self.lock.take() {
            if let Err(e) = FileExt::unlock(&lock) {
                warn!(path = %self.path.display(), error = %e, "Failed to release cache lock");
            } else {
                info!(path = %self.path.display(), "Released cache lock");
            }
        }
    }
}
