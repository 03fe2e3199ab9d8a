//! In-memory note collection with a durable serialized mirror.

use crate::core::storage::DocumentStore;
use crate::{Attachment, DeleteResult, NotepadError, Note, Result};
use uuid::Uuid;

/// Key under which the whole collection is stored as one JSON document.
pub const STORAGE_KEY: &str = "simos-notes-rich-v1";

/// Title given to notes created with [`NoteRepository::create`].
pub const UNTITLED_TITLE: &str = "Untitled";

const WELCOME_TITLE: &str = "Note";
const WELCOME_CONTENT: &str =
    "<p>Welcome. Tap to edit. Add images or videos with the toolbar or drop files.</p>";

/// The note collection plus the currently active note.
///
/// Mutations change the in-memory collection only; callers follow each one
/// with [`save_all`](Self::save_all) so the mirror never lags by more than a
/// single operation.
pub struct NoteRepository<D: DocumentStore> {
    store: D,
    notes: Vec<Note>,
    active_id: Option<String>,
}

impl<D: DocumentStore> NoteRepository<D> {
    /// Opens the repository over `store` and loads the persisted collection.
    pub fn open(store: D, now: i64) -> Self {
        let mut repo = Self {
            store,
            notes: Vec::new(),
            active_id: None,
        };
        repo.load_all(now);
        repo
    }

    /// Reloads the collection from the mirror.
    ///
    /// A missing, unreadable, corrupt or empty document is replaced by a
    /// single welcome note, which is persisted straight away. The first note
    /// becomes active.
    pub fn load_all(&mut self, now: i64) -> &[Note] {
        let loaded = match self.store.get_item(STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Note>>(&raw) {
                Ok(notes) => notes,
                Err(e) => {
                    log::warn!("Stored note collection is corrupt, reseeding: {e}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Could not read note collection, reseeding: {e}");
                Vec::new()
            }
        };

        if loaded.is_empty() {
            self.notes = vec![welcome_note(now)];
            if let Err(e) = self.save_all() {
                log::error!("Failed to persist the welcome note: {e}");
            }
        } else {
            self.notes = loaded;
        }

        self.active_id = self.notes.first().map(|n| n.id.clone());
        &self.notes
    }

    /// Serializes the full collection and replaces the stored document.
    ///
    /// # Errors
    ///
    /// Returns [`NotepadError::Json`] or a storage error. The in-memory
    /// collection is left untouched either way.
    pub fn save_all(&mut self) -> Result<()> {
        let json = serde_json::to_string(&self.notes)?;
        self.store.set_item(STORAGE_KEY, &json)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, note_id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == note_id)
    }

    /// Like [`get`](Self::get) but reports a missing note as an error.
    pub fn require(&self, note_id: &str) -> Result<&Note> {
        self.get(note_id)
            .ok_or_else(|| NotepadError::NoteNotFound(note_id.to_string()))
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Note> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    /// Makes `note_id` the active note.
    pub fn set_active(&mut self, note_id: &str) -> Result<()> {
        self.require(note_id)?;
        self.active_id = Some(note_id.to_string());
        Ok(())
    }

    /// Creates an empty note at the head of the collection and makes it active.
    ///
    /// Returns the ID of the new note.
    pub fn create(&mut self, now: i64) -> String {
        let note = Note {
            id: format!("note-{}", Uuid::new_v4().simple()),
            title: UNTITLED_TITLE.to_string(),
            content: String::new(),
            attachments: Vec::new(),
            updated_at: now,
        };
        let id = note.id.clone();
        self.notes.insert(0, note);
        self.active_id = Some(id.clone());
        id
    }

    pub fn rename(&mut self, note_id: &str, title: &str, now: i64) -> Result<()> {
        let note = self.get_mut(note_id)?;
        note.title = title.to_string();
        note.updated_at = now;
        Ok(())
    }

    pub fn update_content(&mut self, note_id: &str, content: &str, now: i64) -> Result<()> {
        let note = self.get_mut(note_id)?;
        note.content = content.to_string();
        note.updated_at = now;
        Ok(())
    }

    /// Appends attachment metadata to a note.
    ///
    /// The payload must already be in the blob store.
    pub fn add_attachment(&mut self, note_id: &str, attachment: Attachment, now: i64) -> Result<()> {
        let note = self.get_mut(note_id)?;
        note.attachments.push(attachment);
        note.updated_at = now;
        Ok(())
    }

    /// Removes a note. If it was active, the first remaining note becomes active.
    pub fn delete(&mut self, note_id: &str) -> Result<DeleteResult> {
        let index = self
            .notes
            .iter()
            .position(|n| n.id == note_id)
            .ok_or_else(|| NotepadError::NoteNotFound(note_id.to_string()))?;
        let removed = self.notes.remove(index);

        if self.active_id.as_deref() == Some(note_id) {
            self.active_id = self.notes.first().map(|n| n.id.clone());
        }

        Ok(DeleteResult {
            deleted_id: removed.id,
            attachment_ids: removed.attachments.into_iter().map(|a| a.id).collect(),
            active_id: self.active_id.clone(),
        })
    }

    /// Notes whose title or content contains `query`, ignoring case, in collection order.
    ///
    /// The returned iterator is lazy and can be cloned to restart the scan.
    /// An empty query matches every note.
    pub fn search<'a>(&'a self, query: &str) -> Search<'a> {
        Search {
            notes: self.notes.iter(),
            needle: query.to_lowercase(),
        }
    }

    /// Refreshes the active note's `updated_at` without touching its content.
    ///
    /// Returns `false` when there is no active note.
    pub fn touch_active(&mut self, now: i64) -> bool {
        let Some(id) = self.active_id.clone() else {
            return false;
        };
        match self.get_mut(&id) {
            Ok(note) => {
                note.updated_at = now;
                true
            }
            Err(_) => false,
        }
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut D {
        &mut self.store
    }

    fn get_mut(&mut self, note_id: &str) -> Result<&mut Note> {
        self.notes
            .iter_mut()
            .find(|n| n.id == note_id)
            .ok_or_else(|| NotepadError::NoteNotFound(note_id.to_string()))
    }
}

fn welcome_note(now: i64) -> Note {
    Note {
        id: format!("note-{}", Uuid::new_v4().simple()),
        title: WELCOME_TITLE.to_string(),
        content: WELCOME_CONTENT.to_string(),
        attachments: Vec::new(),
        updated_at: now,
    }
}

/// Lazy search over a note collection. See [`NoteRepository::search`].
#[derive(Clone)]
pub struct Search<'a> {
    notes: std::slice::Iter<'a, Note>,
    needle: String,
}

impl<'a> Iterator for Search<'a> {
    type Item = &'a Note;

    fn next(&mut self) -> Option<Self::Item> {
        let needle = &self.needle;
        self.notes.by_ref().find(|note| {
            needle.is_empty()
                || note.title.to_lowercase().contains(needle.as_str())
                || note.content.to_lowercase().contains(needle.as_str())
        })
    }
}

/// Interval timer that decides when the active note should be touched.
///
/// Re-arming (on enable or when the active note changes) restarts the
/// interval, so the first touch lands one full interval later.
#[derive(Debug, Clone)]
pub struct Autosave {
    enabled: bool,
    interval_millis: i64,
    armed_at: i64,
}

impl Autosave {
    pub fn new(enabled: bool, interval_millis: i64, now: i64) -> Self {
        Self {
            enabled,
            interval_millis: interval_millis.max(1),
            armed_at: now,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool, now: i64) {
        self.enabled = enabled;
        self.rearm(now);
    }

    pub fn rearm(&mut self, now: i64) {
        self.armed_at = now;
    }

    /// Returns `true` if at least one interval has elapsed since the last firing.
    pub fn poll(&mut self, now: i64) -> bool {
        if !self.enabled || now - self.armed_at < self.interval_millis {
            return false;
        }
        let elapsed_intervals = (now - self.armed_at) / self.interval_millis;
        self.armed_at += elapsed_intervals * self.interval_millis;
        true
    }
}
