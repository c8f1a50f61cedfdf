//! Key-value cache used for change tracking and scan deduplication.
//!
//! The content-hash cache and the pending scan set are plain string values
//! under well-known keys. Callers inject a [`KeyValueStore`] so tests can
//! use [`MemoryKeyValueStore`] while the CLI persists through
//! [`FileKeyValueStore`].
//!
//! ## Storage Layout
//!
//! ```text
//! <cache_dir>/
//!   seomap.pages_content_hashes.json
//!   seomap.waiting_for_scan.json
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::{Error, Result};

/// String-keyed cache with get/put/forget semantics.
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn forget(&self, key: &str) -> Result<()>;
}

/// In-process store, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        lock(&self.entries, "key-value")
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Store keeping one JSON file per key under a directory.
///
/// Writes are atomic (temp file + rename).
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }

        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| Error::Storage(format!("Failed to read cache entry {key}: {e}")))
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Storage(format!("Failed to create cache directory: {e}")))?;
        write_atomic(&self.key_path(key), value)?;
        debug!(key, "stored cache entry");
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| Error::Storage(format!("Failed to delete cache entry {key}: {e}")))?;
            debug!(key, "forgot cache entry");
        }
        Ok(())
    }
}

/// Write `contents` to `path` through a temp file and rename.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .map_err(|e| Error::Storage(format!("Failed to write temp file: {e}")))?;

    // Handle Windows: remove target before rename
    #[cfg(target_os = "windows")]
    if path.exists() {
        fs::remove_file(path)
            .map_err(|e| Error::Storage(format!("Failed to remove existing file: {e}")))?;
    }

    fs::rename(&tmp_path, path)
        .map_err(|e| Error::Storage(format!("Failed to commit {}: {e}", path.display())))
}

/// Lock a mutex, reporting poisoning as a storage error.
pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| Error::Storage(format!("{what} lock poisoned")))
}
