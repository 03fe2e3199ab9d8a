//! SQLite-backed storage shared by the document mirror and the blob store.

use crate::{NotepadError, Result};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

/// Name of the database file inside the data directory.
pub const DATABASE_FILE: &str = "simos-notes.db";

pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Opens (creating if needed) the database at `path` and ensures the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;

        let table_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type='table'
             AND name IN ('local_storage', 'attachments')",
            [],
            |row| row.get(0),
        )?;

        if table_count != 2 {
            return Err(NotepadError::Storage(
                "Not a valid Notepad database".to_string(),
            ));
        }

        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// A string key-value store holding serialized documents, in the manner of
/// a browser's `localStorage`.
pub trait DocumentStore {
    /// Returns the value stored under `key`, or `None` if nothing was stored.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any prior value.
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
}

/// [`DocumentStore`] persisted in the `local_storage` table.
pub struct SqliteDocumentStore {
    storage: Storage,
}

impl SqliteDocumentStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Storage::open(path)?))
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .storage
            .connection()
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.storage.connection().execute(
            "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }
}

/// In-memory [`DocumentStore`] for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    items: HashMap<String, String>,
    fail_writes: bool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail, simulating an exhausted quota.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            return Err(NotepadError::Storage("quota exceeded".to_string()));
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
