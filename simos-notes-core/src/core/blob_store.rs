//! Durable key-value storage for attachment payloads.

use crate::core::storage::Storage;
use crate::{NotepadError, Payload, Result};
use rusqlite::OptionalExtension;
use std::collections::HashMap;
use std::path::Path;

const KIND_BINARY: &str = "binary";
const KIND_TEXT: &str = "text";

/// Stores attachment payloads keyed by attachment ID.
///
/// A missing key is `Ok(None)`, never an error; errors are reserved for the
/// storage engine itself failing.
pub trait BlobStore {
    /// Stores `payload` under `key`. Returns once the write is committed.
    fn put(&mut self, key: &str, payload: &Payload) -> Result<()>;

    /// Returns the payload stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Payload>>;

    /// Removes the payload under `key`. Returns whether anything was removed.
    fn delete(&mut self, key: &str) -> Result<bool>;
}

/// [`BlobStore`] persisted in the `attachments` table.
pub struct SqliteBlobStore {
    storage: Storage,
}

impl SqliteBlobStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Storage::open(path)?))
    }
}

impl BlobStore for SqliteBlobStore {
    fn put(&mut self, key: &str, payload: &Payload) -> Result<()> {
        let (kind, mime_type, data): (&str, Option<&str>, &[u8]) = match payload {
            Payload::Binary { mime_type, data } => {
                (KIND_BINARY, Some(mime_type.as_str()), data.as_slice())
            }
            Payload::Text(text) => (KIND_TEXT, None, text.as_bytes()),
        };
        self.storage.connection().execute(
            "INSERT OR REPLACE INTO attachments (key, kind, mime_type, data) VALUES (?, ?, ?, ?)",
            rusqlite::params![key, kind, mime_type, data],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Payload>> {
        let row = self
            .storage
            .connection()
            .query_row(
                "SELECT kind, mime_type, data FROM attachments WHERE key = ?",
                [key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((kind, mime_type, data)) = row else {
            return Ok(None);
        };

        match kind.as_str() {
            KIND_BINARY => Ok(Some(Payload::Binary {
                mime_type: mime_type.unwrap_or_else(|| "application/octet-stream".to_string()),
                data,
            })),
            KIND_TEXT => String::from_utf8(data)
                .map(|text| Some(Payload::Text(text)))
                .map_err(|_| NotepadError::Storage(format!("Corrupt text payload: {key}"))),
            other => Err(NotepadError::Storage(format!(
                "Unknown payload kind '{other}' for {key}"
            ))),
        }
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        let removed = self
            .storage
            .connection()
            .execute("DELETE FROM attachments WHERE key = ?", [key])?;
        Ok(removed > 0)
    }
}

/// In-memory [`BlobStore`] for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: HashMap<String, Payload>,
    fail_writes: bool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `put` fail, simulating an aborted transaction.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&mut self, key: &str, payload: &Payload) -> Result<()> {
        if self.fail_writes {
            return Err(NotepadError::Storage("transaction aborted".to_string()));
        }
        self.entries.insert(key.to_string(), payload.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Payload>> {
        Ok(self.entries.get(key).cloned())
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}
