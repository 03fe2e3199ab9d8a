//! Core library for the SimOS Notepad: local-first notes with rich attachments.
//!
//! The primary entry point is [`Notepad`], a session over a [`BlobStore`] for
//! attachment payloads and a [`DocumentStore`] holding the serialized note
//! collection. [`Notepad::open`] binds both to a `simos-notes.db` SQLite file.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    blob_store::{BlobStore, MemoryBlobStore, SqliteBlobStore},
    capture::{CaptureOutcome, CapturePipeline, IncomingFile},
    clock::{Clock, ManualClock, SystemClock},
    delete::DeleteResult,
    error::{NotepadError, Result},
    export::{export_file_name, ExportArtifact, ExportEngine, ExportFormat},
    note::{Attachment, MediaKind, Note, Payload},
    notepad::Notepad,
    object_url::{ObjectUrls, OBJECT_URL_PREFIX},
    recorder::{
        CaptureKind, FinishedRecording, MediaConstraints, MediaDevices, MediaStream, Recorder,
        RecorderState,
    },
    reference::{
        ReferencePattern, ReferenceResolver, ReferenceToken, ResolvedContent,
        DEFAULT_REFERENCE_MARKER,
    },
    repository::{Autosave, NoteRepository, Search, STORAGE_KEY, UNTITLED_TITLE},
    settings::{
        load_settings, load_settings_from, save_settings, save_settings_to, settings_file_path,
        ContentFormat, NotepadSettings, ReferenceSyntax,
    },
    storage::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore, Storage, DATABASE_FILE},
};
