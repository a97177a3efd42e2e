use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use crate::error::StoreError;

/// Durable backing for a [`LocalStore`](crate::LocalStore).
///
/// The store keeps every value in memory and forwards the final value of each
/// changed key after every batch. A `None` value means the key was removed.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a store handle can be
/// shared with the command queue's worker task.
pub trait StorageProvider: Send + Sync + 'static {
    /// Load every persisted entry.
    fn load_all(&self) -> Result<BTreeMap<String, Value>, StoreError>;

    /// Persist the final values of the keys changed by one batch, in order.
    fn write_batch(&self, changes: &[(String, Option<Value>)]) -> Result<(), StoreError>;

    /// Make all previous writes durable. Called on teardown.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn apply_changes(entries: &mut BTreeMap<String, Value>, changes: &[(String, Option<Value>)]) {
    for (key, value) in changes {
        match value {
            Some(value) => {
                entries.insert(key.clone(), value.clone());
            }
            None => {
                entries.remove(key);
            }
        }
    }
}

// ──────────────────────────────────────────────
// MemoryProvider
// ──────────────────────────────────────────────

/// Volatile provider; the default for tests and short-lived stores.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a provider with entries, as if a previous session had written them.
    pub fn with_entries(entries: BTreeMap<String, Value>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl StorageProvider for MemoryProvider {
    fn load_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        // Recover data even if mutex was poisoned by a panic in another thread
        Ok(self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn write_batch(&self, changes: &[(String, Option<Value>)]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        apply_changes(&mut entries, changes);
        Ok(())
    }
}

// ──────────────────────────────────────────────
// FileProvider
// ──────────────────────────────────────────────

/// Provider backed by one JSON document on disk.
///
/// Every batch rewrites the document through a sibling temp file followed by
/// a rename, so a crash leaves either the old or the new document.
#[derive(Debug)]
pub struct FileProvider {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl FileProvider {
    /// Open (or lazily create) the document at `path`.
    ///
    /// A missing file is an empty store; an unreadable or malformed one is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)
                .map_err(|e| StoreError::Provider(format!("read {}: {e}", path.display())))?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_document(&self, entries: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Provider(format!("create {}: {e}", parent.display())))?;
        }
        fs::write(&tmp, text)
            .map_err(|e| StoreError::Provider(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| StoreError::Provider(format!("rename {}: {e}", self.path.display())))?;
        Ok(())
    }
}

impl StorageProvider for FileProvider {
    fn load_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        Ok(self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn write_batch(&self, changes: &[(String, Option<Value>)]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        apply_changes(&mut entries, changes);
        self.write_document(&entries)
    }

    fn flush(&self) -> Result<(), StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.write_document(&entries)
    }
}
