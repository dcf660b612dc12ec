//! Durable Backing Store Module
//!
//! The durable tier mirrors selected entries into a process-surviving
//! key-value medium so the in-memory store can be warmed on next load.
//!
//! The medium is deliberately dumb: a synchronous string-to-string map with
//! enumeration. Namespacing, record encoding, expiry validation and failure
//! recovery all belong to the cache facade. The medium is also externally
//! mutable (another process may clear or rewrite it), so callers must treat
//! every read as fallible and nothing in it as permanent.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::error::{CacheError, Result};

// == Durable Medium Contract ==
/// Synchronous key-value contract of the durable tier.
///
/// `write` may fail with [`CacheError::QuotaExceeded`] when the medium is
/// size-bounded; the facade catches it. `keys` enumerates every stored key and
/// exists for pattern-based clearing and bulk eviction.
pub trait DurableMedium: Send + Sync {
    /// Reads the value stored under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, overwriting any prior value.
    fn write(&mut self, key: &str, value: &str) -> Result<()>;

    /// Removes the value stored under `key`. Missing keys are not an error.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Enumerates all stored keys.
    fn keys(&self) -> Result<Vec<String>>;
}

// == File Medium ==
/// Durable medium backed by a single JSON document on disk.
///
/// The whole map is loaded at open and flushed on every mutation via an
/// atomic temp-file replace. A file that cannot be parsed at open is treated
/// as empty; the cache must survive a medium someone else has damaged.
#[derive(Debug)]
pub struct FileMedium {
    path: PathBuf,
    records: HashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl FileMedium {
    /// Opens (or creates) the medium at `path` with no size bound.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let records = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Durable file {} is corrupt, starting empty: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            records,
            quota_bytes: None,
        })
    }

    /// Opens the medium with a total size bound in bytes.
    pub fn open_with_quota(path: impl AsRef<Path>, quota_bytes: usize) -> Result<Self> {
        let mut medium = Self::open(path)?;
        medium.quota_bytes = Some(quota_bytes);
        Ok(medium)
    }

    fn stored_bytes(&self) -> usize {
        self.records
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    fn flush(&self) -> Result<()> {
        let serialized = serde_json::to_string(&self.records)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serialized)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DurableMedium for FileMedium {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(quota) = self.quota_bytes {
            let existing = self.records.get(key).map(|v| v.len() + key.len()).unwrap_or(0);
            let after = self.stored_bytes() - existing + key.len() + value.len();
            if after > quota {
                return Err(CacheError::QuotaExceeded(format!(
                    "{} bytes would exceed quota of {} bytes",
                    after, quota
                )));
            }
        }

        self.records.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.records.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.records.keys().cloned().collect())
    }
}

// == Memory Medium ==
/// Durable medium held in memory behind a shared handle.
///
/// Clones share the same storage, so a `CacheStore` rebuilt around a clone of
/// the handle sees everything the previous store persisted. Useful for
/// ephemeral sessions and for exercising reload behavior in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    records: Arc<Mutex<HashMap<String, String>>>,
    quota_bytes: Option<usize>,
}

impl MemoryMedium {
    /// Creates an empty medium with no size bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty medium with a total size bound in bytes.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned lock only means a panic elsewhere mid-mutation; the map
        // itself is still a valid String map.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DurableMedium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        let mut records = self.lock();

        if let Some(quota) = self.quota_bytes {
            let existing = records.get(key).map(|v| v.len() + key.len()).unwrap_or(0);
            let current: usize = records.iter().map(|(k, v)| k.len() + v.len()).sum();
            let after = current - existing + key.len() + value.len();
            if after > quota {
                return Err(CacheError::QuotaExceeded(format!(
                    "{} bytes would exceed quota of {} bytes",
                    after, quota
                )));
            }
        }

        records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock().keys().cloned().collect())
    }
}
