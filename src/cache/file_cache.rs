//! JSON File Cache
//!
//! Stores one JSON document per cache key (`<cache_dir>/<key>.json`).
//! Freshness is derived from the file's modification time only: there is no
//! stored expiry and no versioning. Reads that fail are misses, writes that
//! fail are logged and dropped, so callers always keep their in-memory data.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, Weak};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

/// Registry size below which dead lock entries are not pruned
const MIN_PRUNE_AT: usize = 64;

/// Per-key async mutexes, tracked weakly.
///
/// An entry stays alive as long as a guard or a waiter holds its mutex, so a
/// key never gets a second mutex while the first is in use. Dead entries are
/// pruned once the map doubles in size since the last sweep.
struct LockTable {
    entries: HashMap<String, Weak<Mutex<()>>>,
    prune_at: usize,
}

impl LockTable {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            prune_at: MIN_PRUNE_AT,
        }
    }

    fn handle(&mut self, key: &str) -> Arc<Mutex<()>> {
        if let Some(mutex) = self.entries.get(key).and_then(Weak::upgrade) {
            return mutex;
        }

        if self.entries.len() >= self.prune_at {
            self.entries.retain(|_, lock| lock.strong_count() > 0);
            self.prune_at = (self.entries.len() * 2).max(MIN_PRUNE_AT);
        }

        let mutex = Arc::new(Mutex::new(()));
        self.entries.insert(key.to_string(), Arc::downgrade(&mutex));
        mutex
    }
}

/// On-disk key → JSON store with per-key locking for read-modify-write cycles
pub struct CacheStore {
    /// Root directory for cache files (created on first write)
    cache_dir: PathBuf,
    /// One async mutex per key; the file system itself is not locked
    locks: std::sync::Mutex<LockTable>,
}

impl CacheStore {
    /// Create a cache rooted at `cache_dir`
    pub fn new(cache_dir: PathBuf) -> Self {
        let cache = Self {
            cache_dir,
            locks: std::sync::Mutex::new(LockTable::new()),
        };

        // Clean up any temp files left by interrupted writes
        cache.cleanup();

        debug!(cache_dir = %cache.cache_dir.display(), "JSON cache initialized");
        cache
    }

    /// Get the cache directory path
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the JSON file backing `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        // Keys embed remote ids; keep them to a single path component
        let safe_key = key.replace(['/', '\\', ':'], "_");
        self.cache_dir.join(format!("{}.json", safe_key))
    }

    /// Whether the entry exists and was written less than `expiry` ago
    pub async fn is_valid(&self, key: &str, expiry: Duration) -> bool {
        let path = self.path_for(key);
        let modified = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };

        // A modification time in the future counts as age zero
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        age < expiry
    }

    /// Read and deserialize an entry. Missing or unreadable entries are `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);

        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(_) => {
                debug!(key = key, "Cache MISS");
                return None;
            }
        };

        match serde_json::from_slice(&content) {
            Ok(data) => {
                debug!(key = key, "Cache HIT");
                Some(data)
            }
            Err(e) => {
                warn!(key = key, error = %e, "Cache entry unreadable, treating as miss");
                None
            }
        }
    }

    /// Serialize and store an entry, replacing any previous one.
    ///
    /// Best effort: failures are logged, never returned.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T) {
        let bytes = match serde_json::to_vec_pretty(data) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(key = key, error = %e, "Cache write failed: not serializable");
                return;
            }
        };

        let cache_dir = self.cache_dir.clone();
        let path = self.path_for(key);
        let size = bytes.len();

        let written =
            tokio::task::spawn_blocking(move || store_atomic(&cache_dir, &path, &bytes)).await;

        match written {
            Ok(Ok(())) => info!(key = key, size = size, "Cache updated"),
            Ok(Err(e)) => error!(key = key, error = %e, "Cache write failed"),
            Err(e) => error!(key = key, error = %e, "Cache write task failed"),
        }
    }

    /// Remove one entry. A missing entry is not an error.
    pub async fn delete(&self, key: &str) {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => info!(key = key, "Cache deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = key, "Cache delete: no entry")
            }
            Err(e) => warn!(key = key, error = %e, "Cache delete failed"),
        }
    }

    /// Remove every `*.json` entry in the cache directory
    pub async fn clear(&self) {
        let mut read_dir = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(read_dir) => read_dir,
            Err(e) => {
                error!(cache_dir = %self.cache_dir.display(), error = %e, "Cache clear failed");
                return;
            }
        };

        let mut paths = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if path.extension().is_some_and(|ext| ext == "json") {
                        paths.push(path);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Cache clear failed while listing entries");
                    break;
                }
            }
        }

        let removals = paths.iter().map(tokio::fs::remove_file);
        let failed = futures::future::join_all(removals)
            .await
            .into_iter()
            .filter(|r| r.is_err())
            .count();

        if failed > 0 {
            warn!(failed = failed, "Some cache entries could not be removed");
        }
        info!(removed = paths.len() - failed, "Cache cleared");
    }

    /// Take the mutex for `key`, serializing read-modify-write cycles on it.
    ///
    /// Only callers that take the lock are serialized; plain `get`/`set` don't.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle(key);
        mutex.lock_owned().await
    }

    /// Number of keys currently tracked by the lock registry
    pub fn tracked_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Clean up stale temp files on startup
    pub fn cleanup(&self) {
        // Remove any .tmp files left from interrupted writes
        if let Ok(read_dir) = std::fs::read_dir(&self.cache_dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                if let Some(ext) = path.extension() {
                    if ext == "tmp" {
                        debug!(path = %path.display(), "Removing stale temp file");
                        let _ = std::fs::remove_file(&path);
                    }
                }
            }
        }
    }
}

/// Write `data` to `path` via a temp file in the same directory
fn store_atomic(cache_dir: &Path, path: &Path, data: &[u8]) -> Result<()> {
    std::fs::create_dir_all(cache_dir)
        .with_context(|| format!("Failed to create cache directory: {:?}", cache_dir))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(cache_dir)
        .context("Failed to create temp file for cache")?;

    tmp.write_all(data).context("Failed to write cache file")?;

    tmp.persist(path)
        .with_context(|| format!("Failed to persist cache file: {:?}", path))?;

    Ok(())
}
