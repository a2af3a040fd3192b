//! Persistence layer.
//!
//! A small key-value abstraction over JSON values. `JsonFileStore` keeps the
//! whole map in one JSON file and writes through on every mutation;
//! `MemoryStore` backs tests. `WatchStore` is the typed facade that names
//! every persisted key.

pub mod watch;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

pub use watch::{PersistedSelection, PersistedWatch, WatchStore};

/// Default state file path.
pub const DEFAULT_STATE_FILE: &str = "newswatch_state.json";

/// Durable key-value storage of JSON values.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile store, used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Store persisted as a single pretty-printed JSON object.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read state from {}", path.display()))?;
            let entries: Map<String, Value> = serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse state from {}", path.display()))?;
            info!(path = %path.display(), keys = entries.len(), "State loaded from disk");
            entries
        } else {
            info!(path = %path.display(), "No saved state found, starting fresh");
            Map::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the next state is staged in before it replaces `path`.
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write the whole map, replacing the file atomically so a crash
    /// mid-write leaves the previous state readable.
    fn flush(&self, entries: &Map<String, Value>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries).context("Failed to serialise state")?;
        let staging = self.staging_path();
        std::fs::write(&staging, json)
            .with_context(|| format!("Failed to write state to {}", staging.display()))?;
        std::fs::rename(&staging, &self.path)
            .with_context(|| format!("Failed to replace state file {}", self.path.display()))?;
        debug!(path = %self.path.display(), keys = entries.len(), "State saved");
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Delete a state file (for testing or reset).
pub fn delete_state(path: &str) -> Result<()> {
    if Path::new(path).exists() {
        std::fs::remove_file(path).context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

fn lock(entries: &Mutex<Map<String, Value>>) -> std::sync::MutexGuard<'_, Map<String, Value>> {
    // A panic while holding the lock leaves the map itself intact.
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
