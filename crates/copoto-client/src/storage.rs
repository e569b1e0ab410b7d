//! Durable key-value storage for session state.
//!
//! The credential store and the session terminator persist through this
//! trait so a session survives process restarts. Storage is synchronous and
//! expected to be always available.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Synchronous string key-value storage.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process storage; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// JSON-file-backed storage.
///
/// The whole map is rewritten on every change; entries are cached in memory
/// after the initial load.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open a store at `path`, loading existing entries if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                Error::Storage(format!("Failed to read {}: {}", path.display(), e))
            })?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    Error::Storage(format!("Failed to parse {}: {}", path.display(), e))
                })?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Get the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create storage directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)
            .map_err(|e| Error::Storage(format!("Failed to write storage file: {}", e)))?;

        tracing::trace!(path = %self.path.display(), "storage flushed");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}
