//! Shared persistent key-value store.
//!
//! A single JSON object on disk mapping account addresses to arbitrary
//! values, shared read/write by every pipeline in a run. One process-wide
//! mutex covers the whole load-mutate-persist cycle; the store is small and
//! writes are infrequent, so whole-file rewrite under a coarse lock beats
//! partial-write corruption.

use crate::errors::StoreError;
use parking_lot::Mutex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

type StoreMap = serde_json::Map<String, Value>;

/// Mutex-guarded, file-backed JSON map.
///
/// Read failures degrade: a missing or corrupt backing file reads as an
/// empty store and is recreated as `{}`. Write failures are surfaced so
/// data loss stays visible.
#[derive(Debug)]
pub struct SharedStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SharedStore {
    /// Creates a store backed by `path`. The file is not touched until the
    /// first read or write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the value stored under `key`, if any.
    ///
    /// Never fails: an unreadable store reads as "no record found" so the
    /// caller can treat the account as first-seen.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let _guard = self.lock.lock();
        self.load_all().get(key).cloned()
    }

    /// Stores `value` under `key`, persisting the whole store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing file cannot be written.
    pub fn put(&self, key: impl Into<String>, value: Value) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut map = self.load_all();
        map.insert(key.into(), value);
        self.save_all(&map)
    }

    /// Read-modify-writes the entry under `key` in one locked cycle.
    ///
    /// `f` receives the current value (if any) and returns the new one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing file cannot be written.
    pub fn update<F>(&self, key: &str, f: F) -> Result<Value, StoreError>
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let _guard = self.lock.lock();
        let mut map = self.load_all();
        let new_value = f(map.get(key));
        map.insert(key.to_string(), new_value.clone());
        self.save_all(&map)?;
        Ok(new_value)
    }

    /// Removes the entry under `key`, returning the old value if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing file cannot be written.
    pub fn remove(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.lock.lock();
        let mut map = self.load_all();
        let old = map.remove(key);
        if old.is_some() {
            self.save_all(&map)?;
        }
        Ok(old)
    }

    /// Returns all stored keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let _guard = self.lock.lock();
        self.load_all().keys().cloned().collect()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let _guard = self.lock.lock();
        self.load_all().len()
    }

    /// Returns true if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Caller must hold `self.lock`.
    fn load_all(&self) -> StoreMap {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<StoreMap>(&raw) {
                Ok(map) => map,
                Err(err) => {
                    warn!(
                        path = %self.path.display(),
                        error = %err,
                        "Store file is corrupt, treating as empty and recreating"
                    );
                    self.recreate_empty();
                    StoreMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Store file absent, creating empty store");
                self.recreate_empty();
                StoreMap::new()
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Store file unreadable, treating as empty"
                );
                StoreMap::new()
            }
        }
    }

    // Best effort; a failure here only delays recreation to the next write.
    fn recreate_empty(&self) {
        if let Err(err) = self.save_all(&StoreMap::new()) {
            warn!(
                path = %self.path.display(),
                error = %err,
                "Failed to recreate empty store file"
            );
        }
    }

    // Temp-file-then-rename keeps concurrent readers from ever seeing a
    // half-written file.
    fn save_all(&self, map: &StoreMap) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, raw).map_err(|source| StoreError::Persist {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Persist {
            path: self.path.clone(),
            source,
        })
    }
}
