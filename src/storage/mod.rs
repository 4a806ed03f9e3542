//! Durable key/value string storage for client-side session state.
//!
//! The tab store serializes itself to a single JSON document and hands it to
//! a [`StateStorage`] under one key. Three backends are provided: an
//! in-process map, one JSON file per key, and an SQLite table.

mod sqlite;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub use sqlite::SqliteStorage;

use crate::error::StorageError;

pub trait StateStorage: Send {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// In-memory storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key under a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| io_error(&self.dir, source))
    }
}

impl StateStorage for JsonFileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let file = self.file(key);
        if !file.exists() {
            return Ok(None);
        }
        fs::read_to_string(&file)
            .map(Some)
            .map_err(|source| io_error(&file, source))
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.ensure_dir()?;
        let file = self.file(key);
        // Write then rename so a crash mid-write leaves the previous document.
        let tmp = file.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|source| io_error(&tmp, source))?;
        fs::rename(&tmp, &file).map_err(|source| io_error(&file, source))
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let file = self.file(key);
        match fs::remove_file(&file) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(&file, source)),
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_clones_share_entries() {
        let mut storage = MemoryStorage::new();
        let view = storage.clone();
        storage.save("apiTabs", "{}").unwrap();
        assert_eq!(view.load("apiTabs").unwrap().as_deref(), Some("{}"));
        storage.remove("apiTabs").unwrap();
        assert!(view.load("apiTabs").unwrap().is_none());
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonFileStorage::new(dir.path().join("state"));

        assert!(storage.load("apiTabs").unwrap().is_none());
        storage.save("apiTabs", r#"{"tabs":[]}"#).unwrap();
        storage.save("apiTabs", r#"{"tabs":[],"activeTabId":null}"#).unwrap();
        assert_eq!(
            storage.load("apiTabs").unwrap().as_deref(),
            Some(r#"{"tabs":[],"activeTabId":null}"#)
        );
        assert!(dir.path().join("state/apiTabs.json").exists());

        storage.remove("apiTabs").unwrap();
        storage.remove("apiTabs").unwrap();
        assert!(storage.load("apiTabs").unwrap().is_none());
    }
}
