//! A Notepad session: the note collection, its attachments, capture and export.
//!
//! [`Notepad`] is the single entry point hosts talk to. Every mutation is
//! applied in memory first and then mirrored to storage. When the mirror
//! write fails the change is kept in memory and a user-visible notification
//! is queued instead of failing the call.

use crate::core::blob_store::{BlobStore, SqliteBlobStore};
use crate::core::capture::{CaptureOutcome, CapturePipeline, IncomingFile};
use crate::core::clock::{Clock, SystemClock};
use crate::core::export::{ExportArtifact, ExportEngine, ExportFormat};
use crate::core::markup::content_to_html;
use crate::core::object_url::ObjectUrls;
use crate::core::recorder::{CaptureKind, MediaDevices, Recorder, RecorderState};
use crate::core::reference::{ReferencePattern, ReferenceResolver, ResolvedContent};
use crate::core::repository::{Autosave, NoteRepository, Search};
use crate::core::settings::{ContentFormat, NotepadSettings};
use crate::core::storage::{DocumentStore, SqliteDocumentStore, Storage, DATABASE_FILE};
use crate::{Attachment, DeleteResult, Note, NotepadError, Payload, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// An open Notepad session over a blob store and a document store.
pub struct Notepad<B: BlobStore, D: DocumentStore> {
    repo: NoteRepository<D>,
    blobs: B,
    resolver: ReferenceResolver,
    exporter: ExportEngine,
    content_format: ContentFormat,
    recorder: Recorder,
    autosave: Autosave,
    clock: Box<dyn Clock>,
    object_urls: ObjectUrls,
    /// Object URLs of the latest preview of each note.
    previews: HashMap<String, Vec<String>>,
    notifications: Vec<String>,
}

impl Notepad<SqliteBlobStore, SqliteDocumentStore> {
    /// Opens (or creates) `simos-notes.db` in the configured data directory.
    ///
    /// # Errors
    ///
    /// Returns [`NotepadError::InvalidSettings`] for unusable settings, or a
    /// storage error if the directory or database cannot be opened.
    pub fn open(settings: &NotepadSettings) -> Result<Self> {
        settings.validate()?;
        let dir = Path::new(&settings.data_directory);
        fs::create_dir_all(dir)?;
        let db_path = dir.join(DATABASE_FILE);
        log::info!("Opening notes database at {}", db_path.display());

        let docs = SqliteDocumentStore::new(Storage::open(&db_path)?);
        let blobs = SqliteBlobStore::new(Storage::open(&db_path)?);
        Ok(Self::with_stores(blobs, docs, settings, Box::new(SystemClock)))
    }
}

impl<B: BlobStore, D: DocumentStore> Notepad<B, D> {
    /// Builds a session over explicit stores and clock, loading the collection.
    pub fn with_stores(blobs: B, docs: D, settings: &NotepadSettings, clock: Box<dyn Clock>) -> Self {
        let now = clock.now_millis();
        let resolver = ReferenceResolver::new(ReferencePattern::default(), settings.reference_syntax);
        Self {
            repo: NoteRepository::open(docs, now),
            blobs,
            exporter: ExportEngine::new(resolver.clone(), settings.content_format),
            resolver,
            content_format: settings.content_format,
            recorder: Recorder::new(),
            autosave: Autosave::new(
                settings.autosave_enabled,
                settings.autosave_interval_millis(),
                now,
            ),
            clock,
            object_urls: ObjectUrls::new(),
            previews: HashMap::new(),
            notifications: Vec::new(),
        }
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    // ── Notes ────────────────────────────────────────────────────────────────

    pub fn notes(&self) -> &[Note] {
        self.repo.notes()
    }

    pub fn note(&self, note_id: &str) -> Option<&Note> {
        self.repo.get(note_id)
    }

    pub fn active_note(&self) -> Option<&Note> {
        self.repo.active()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.repo.active_id()
    }

    /// Makes `note_id` active and restarts the autosave interval.
    pub fn select(&mut self, note_id: &str) -> Result<()> {
        self.repo.set_active(note_id)?;
        self.autosave.rearm(self.now());
        Ok(())
    }

    /// Creates an empty note at the top of the list and selects it.
    pub fn new_note(&mut self) -> String {
        let now = self.now();
        let id = self.repo.create(now);
        self.autosave.rearm(now);
        self.persist();
        id
    }

    pub fn rename_note(&mut self, note_id: &str, title: &str) -> Result<()> {
        let now = self.now();
        self.repo.rename(note_id, title, now)?;
        self.persist();
        Ok(())
    }

    pub fn update_content(&mut self, note_id: &str, content: &str) -> Result<()> {
        let now = self.now();
        self.repo.update_content(note_id, content, now)?;
        self.persist();
        Ok(())
    }

    /// Deletes a note after `confirm` approves it, together with its payloads.
    ///
    /// Returns `Ok(None)` when the deletion was declined.
    pub fn delete_note(
        &mut self,
        note_id: &str,
        confirm: impl FnOnce(&Note) -> bool,
    ) -> Result<Option<DeleteResult>> {
        if !confirm(self.repo.require(note_id)?) {
            log::debug!("Deletion of {note_id} declined");
            return Ok(None);
        }
        let previous_active = self.repo.active_id().map(str::to_string);
        let result = self.repo.delete(note_id)?;
        self.forget_preview(note_id);

        // Payloads go only once the collection without the note is on disk.
        if self.persist() {
            for attachment_id in &result.attachment_ids {
                if let Err(e) = self.blobs.delete(attachment_id) {
                    log::warn!("Could not delete payload {attachment_id}: {e}");
                }
            }
        } else if !result.attachment_ids.is_empty() {
            log::warn!(
                "Keeping {} payload(s) of {} until the collection can be saved",
                result.attachment_ids.len(),
                result.deleted_id
            );
        }
        if result.active_id != previous_active {
            self.autosave.rearm(self.now());
        }
        log::info!(
            "Deleted {} and {} attachment(s)",
            result.deleted_id,
            result.attachment_ids.len()
        );
        Ok(Some(result))
    }

    pub fn search<'a>(&'a self, query: &str) -> Search<'a> {
        self.repo.search(query)
    }

    // ── Autosave ─────────────────────────────────────────────────────────────

    pub fn autosave_enabled(&self) -> bool {
        self.autosave.is_enabled()
    }

    pub fn set_autosave(&mut self, enabled: bool) {
        let now = self.now();
        self.autosave.set_enabled(enabled, now);
    }

    /// Drives the autosave timer. Call periodically.
    ///
    /// Returns `true` when the active note was touched and persisted.
    pub fn tick(&mut self) -> bool {
        let now = self.now();
        self.autosave.poll(now) && self.touch_at(now)
    }

    /// Touches the active note immediately, as one autosave firing would.
    pub fn touch_active(&mut self) -> bool {
        let now = self.now();
        self.touch_at(now)
    }

    fn touch_at(&mut self, now: i64) -> bool {
        if !self.repo.touch_active(now) {
            return false;
        }
        self.persist();
        true
    }

    // ── Capture ──────────────────────────────────────────────────────────────

    fn pipeline(&mut self) -> CapturePipeline<'_, B, D> {
        CapturePipeline::new(&mut self.blobs, &mut self.repo, &self.resolver)
    }

    /// Attaches a picked file to `note_id`.
    pub fn attach_file(
        &mut self,
        note_id: &str,
        file: IncomingFile,
        insert_inline: bool,
        cursor: Option<usize>,
    ) -> Result<CaptureOutcome> {
        let now = self.now();
        let outcome = self.pipeline().attach(file, note_id, insert_inline, cursor, now);
        self.finish_capture(outcome)
    }

    /// Attaches dropped files in order at the drop position.
    pub fn attach_dropped(
        &mut self,
        note_id: &str,
        files: Vec<IncomingFile>,
        cursor: Option<usize>,
    ) -> Vec<Result<Attachment>> {
        let now = self.now();
        let results = self.pipeline().attach_many(files, note_id, cursor, now);
        if results.iter().any(|r| r.is_ok()) {
            self.persist();
        }
        for error in results.iter().filter_map(|r| r.as_ref().err()) {
            log::warn!("Dropped file rejected: {error}");
            self.notifications.push(error.user_message());
        }
        results
    }

    /// Drags an existing attachment of `note_id` back into its content.
    pub fn insert_existing_attachment(
        &mut self,
        note_id: &str,
        attachment_id: &str,
        cursor: Option<usize>,
    ) -> Result<usize> {
        let now = self.now();
        let end = self
            .pipeline()
            .insert_existing(note_id, attachment_id, cursor, now)?;
        self.persist();
        Ok(end)
    }

    /// Starts recording into the active note.
    pub fn start_recording(&mut self, devices: &mut dyn MediaDevices, kind: CaptureKind) -> Result<()> {
        let note_id = self
            .repo
            .active_id()
            .map(str::to_string)
            .ok_or_else(|| NotepadError::NoteNotFound("no active note".to_string()))?;
        let started = self.recorder.start(devices, kind, &note_id);
        self.report(started)
    }

    pub fn push_recording_chunk(&mut self, chunk: Vec<u8>) -> Result<()> {
        self.recorder.push_chunk(chunk)
    }

    /// Stops recording and stores the result inline in the note it was started on.
    ///
    /// The device is released and the recorder returns to idle even when
    /// storing fails.
    pub fn stop_recording(&mut self, cursor: Option<usize>) -> Result<CaptureOutcome> {
        let now = self.now();
        let finished = self.recorder.stop(now)?;
        let outcome = self
            .pipeline()
            .attach(finished.file, &finished.note_id, true, cursor, now);
        self.recorder.finish();
        self.finish_capture(outcome)
    }

    pub fn recording_state(&self) -> RecorderState {
        self.recorder.state()
    }

    fn finish_capture(&mut self, outcome: Result<CaptureOutcome>) -> Result<CaptureOutcome> {
        if outcome.is_ok() {
            self.persist();
        }
        self.report(outcome)
    }

    // ── Preview ──────────────────────────────────────────────────────────────

    /// Renders a note for on-screen display with live object URLs.
    ///
    /// The returned URLs stay live until they are revoked with
    /// [`revoke_preview`](Self::revoke_preview), the same note is previewed
    /// again, or the note is deleted. Only the latest preview of a note is
    /// kept alive.
    pub fn preview(&mut self, note_id: &str) -> Result<ResolvedContent> {
        let html = content_to_html(&self.repo.require(note_id)?.content, self.content_format);
        self.forget_preview(note_id);
        let resolved = self
            .resolver
            .resolve_for_display(&html, &self.blobs, &mut self.object_urls);
        self.previews
            .insert(note_id.to_string(), resolved.object_urls.clone());
        Ok(resolved)
    }

    fn forget_preview(&mut self, note_id: &str) {
        if let Some(urls) = self.previews.remove(note_id) {
            log::debug!("Revoking {} object URL(s) of the previous preview of {note_id}", urls.len());
            self.object_urls.revoke_all(&urls);
        }
    }

    /// A URL (or the literal text) for one attachment of `note_id`.
    pub fn attachment_preview(&mut self, note_id: &str, attachment_id: &str) -> Result<String> {
        if self.repo.require(note_id)?.attachment(attachment_id).is_none() {
            return Err(NotepadError::AttachmentNotFound(attachment_id.to_string()));
        }
        match self.blobs.get(attachment_id)? {
            Some(Payload::Binary { mime_type, data }) => Ok(self.object_urls.create(&mime_type, data)),
            Some(Payload::Text(text)) => Ok(text),
            None => Err(NotepadError::AttachmentNotFound(attachment_id.to_string())),
        }
    }

    /// Looks up a live object URL.
    pub fn fetch_object_url(&self, url: &str) -> Option<(&str, &[u8])> {
        self.object_urls.fetch(url)
    }

    pub fn revoke_preview(&mut self, preview: &ResolvedContent) {
        self.object_urls.revoke_all(&preview.object_urls);
        self.previews
            .retain(|_, urls| !urls.iter().any(|url| preview.object_urls.contains(url)));
    }

    pub fn revoke_object_url(&mut self, url: &str) -> bool {
        self.object_urls.revoke(url)
    }

    // ── Export ───────────────────────────────────────────────────────────────

    pub fn export(&self, note_id: &str, format: ExportFormat) -> Result<ExportArtifact> {
        let note = self.repo.require(note_id)?;
        self.exporter.export(note, &self.blobs, format)
    }

    /// Exports `note_id` and writes the artifact into `dir`.
    pub fn export_to(&self, note_id: &str, format: ExportFormat, dir: &Path) -> Result<PathBuf> {
        self.export(note_id, format)?.write_to(dir)
    }

    // ── Notifications ────────────────────────────────────────────────────────

    /// Drains the user-visible messages queued since the last call.
    pub fn take_notifications(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notifications)
    }

    pub fn blob_store(&self) -> &B {
        &self.blobs
    }

    pub fn blob_store_mut(&mut self) -> &mut B {
        &mut self.blobs
    }

    pub fn document_store_mut(&mut self) -> &mut D {
        self.repo.store_mut()
    }

    /// Mirrors the collection to storage. Returns `false` if the write failed.
    fn persist(&mut self) -> bool {
        match self.repo.save_all() {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to save notes: {e}");
                self.notifications.push(e.user_message());
                false
            }
        }
    }

    /// Queues a notification for failures the user should hear about.
    fn report<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_storage_failure()
                || matches!(
                    e,
                    NotepadError::CaptureFailure(_) | NotepadError::PermissionDenied(_)
                )
            {
                log::warn!("{e}");
                self.notifications.push(e.user_message());
            }
        }
        result
    }
}
