//! Side-table mapping local directory names back to their references.
//!
//! Stored as `references.json` in the cache root. Every read-modify-write
//! holds an exclusive lock on `references.lock` so fetches of different
//! references running in parallel do not lose each other's entries.

use crate::atomic::{atomic_read_json, atomic_write_json};
use crate::error::{Result, StoreError};
use crate::reference::local_dir_name;
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::warn;

const INDEX_FILE_NAME: &str = "references.json";
const LOCK_FILE_NAME: &str = "references.lock";

/// Ownership of a local directory according to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// No entry: the directory predates the index or was never committed.
    Unknown,
    /// The directory belongs to the queried reference.
    Owned,
    /// The directory belongs to a different reference.
    Foreign(String),
}

/// Persistent directory-name → reference map.
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    index_path: PathBuf,
    lock_path: PathBuf,
}

impl ReferenceIndex {
    pub fn new(cache_root: &Path) -> Self {
        Self {
            index_path: cache_root.join(INDEX_FILE_NAME),
            lock_path: cache_root.join(LOCK_FILE_NAME),
        }
    }

    /// True for the index's own files, which share the cache root with bundles.
    pub fn is_index_file(&self, path: &Path) -> bool {
        path == self.index_path || path == self.lock_path
    }

    /// Load the whole map. A corrupt index reads as empty.
    pub fn load(&self) -> Result<BTreeMap<String, String>> {
        match atomic_read_json(&self.index_path) {
            Ok(map) => Ok(map.unwrap_or_default()),
            Err(StoreError::Json { message, .. }) => {
                warn!("Ignoring unreadable reference index: {}", message);
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Who owns the directory `reference` maps to.
    pub fn ownership(&self, reference: &str) -> Result<Ownership> {
        let map = self.load()?;
        Ok(match map.get(&local_dir_name(reference)) {
            None => Ownership::Unknown,
            Some(owner) if owner == reference => Ownership::Owned,
            Some(owner) => Ownership::Foreign(owner.clone()),
        })
    }

    /// Record `reference` as the owner of its directory.
    pub fn record(&self, reference: &str) -> Result<()> {
        self.update(|map| {
            map.insert(local_dir_name(reference), reference.to_string());
        })
    }

    /// Drop the entry for the directory `reference` maps to.
    pub fn forget(&self, reference: &str) -> Result<()> {
        self.update(|map| {
            map.remove(&local_dir_name(reference));
        })
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _lock = self.lock()?;
        let mut map = self.load()?;
        mutate(&mut map);
        atomic_write_json(&self.index_path, &map)
    }

    /// Exclusive lock released when the returned handle drops.
    fn lock(&self) -> Result<File> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io_with_path(e, parent))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| StoreError::io_with_path(e, &self.lock_path))?;
        file.lock_exclusive()
            .map_err(|e| StoreError::io_with_path(e, &self.lock_path))?;
        Ok(file)
    }
}
