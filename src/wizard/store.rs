//! Durable storage for the serialized wizard state.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Key under which the wizard state blob is stored.
pub const STORAGE_KEY: &str = "nocomelon-wizard-state";

/// A single-slot string store, the terminal counterpart of browser local storage.
pub trait StateStore {
    /// Returns the stored blob, or `None` if nothing was saved.
    fn load(&self) -> std::io::Result<Option<String>>;
    fn save(&self, blob: &str) -> std::io::Result<()>;
    /// Removing a missing entry is not an error.
    fn remove(&self) -> std::io::Result<()>;
}

/// Stores the blob as `<dir>/nocomelon-wizard-state.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStore {
    fn load(&self) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, blob: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename: readers never observe a partial blob.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, blob)?;
        std::fs::rename(&tmp, &self.path)
    }

    fn remove(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// In-memory store; clones share the same slot.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<String>>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_blob(blob: &str) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(blob.to_string()))),
        }
    }

    pub fn blob(&self) -> Option<String> {
        self.slot.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl StateStore for MemoryStore {
    fn load(&self) -> std::io::Result<Option<String>> {
        Ok(self.blob())
    }

    fn save(&self, blob: &str) -> std::io::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| std::io::Error::other("memory store poisoned"))?;
        *slot = Some(blob.to_string());
        Ok(())
    }

    fn remove(&self) -> std::io::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| std::io::Error::other("memory store poisoned"))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_roundtrip_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(&dir.path().join("nested"));

        assert_eq!(store.load().unwrap(), None);
        store.save(r#"{"run_id":"run123"}"#).unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some(r#"{"run_id":"run123"}"#));
        assert!(store.path().ends_with("nocomelon-wizard-state.json"));

        store.remove().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // Removing twice is fine.
        store.remove().unwrap();
    }

    #[test]
    fn memory_store_clones_share_slot() {
        let store = MemoryStore::default();
        let other = store.clone();
        store.save("blob").unwrap();
        assert_eq!(other.load().unwrap().as_deref(), Some("blob"));
        other.remove().unwrap();
        assert_eq!(store.blob(), None);
    }
}
