use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use super::StateStorage;
use crate::error::StorageError;

/// Key/value state in an `app_state` table of an SQLite database.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS app_state (
               state_key TEXT PRIMARY KEY,
               state_json TEXT NOT NULL,
               updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now'))
             );",
        )?;
        Ok(Self { conn })
    }
}

impl StateStorage for SqliteStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT state_json FROM app_state WHERE state_key = ?1 LIMIT 1;",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO app_state (state_key, state_json, updated_at)
             VALUES (?1, ?2, strftime('%s','now'))
             ON CONFLICT(state_key)
             DO UPDATE SET
               state_json = excluded.state_json,
               updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM app_state WHERE state_key = ?1;", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upserts_by_key() {
        let mut storage = SqliteStorage::in_memory().unwrap();
        assert!(storage.load("apiTabs").unwrap().is_none());

        storage.save("apiTabs", "first").unwrap();
        storage.save("apiTabs", "second").unwrap();
        storage.save("other", "x").unwrap();
        assert_eq!(storage.load("apiTabs").unwrap().as_deref(), Some("second"));

        storage.remove("apiTabs").unwrap();
        assert!(storage.load("apiTabs").unwrap().is_none());
        assert_eq!(storage.load("other").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.db");
        {
            let mut storage = SqliteStorage::open(&path).unwrap();
            storage.save("apiTabs", r#"{"tabs":[]}"#).unwrap();
        }
        let storage = SqliteStorage::open(&path).unwrap();
        assert_eq!(storage.load("apiTabs").unwrap().as_deref(), Some(r#"{"tabs":[]}"#));
    }
}
