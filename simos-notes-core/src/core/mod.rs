//! Internal domain modules for the Notepad core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod blob_store;
pub mod capture;
pub mod clock;
pub mod delete;
pub mod error;
pub mod export;
pub mod markup;
pub mod note;
pub mod notepad;
pub mod object_url;
pub mod pdf;
pub mod recorder;
pub mod reference;
pub mod repository;
pub mod settings;
pub mod storage;

#[doc(inline)]
pub use blob_store::{BlobStore, MemoryBlobStore, SqliteBlobStore};
#[doc(inline)]
pub use capture::{CaptureOutcome, CapturePipeline, IncomingFile};
#[doc(inline)]
pub use clock::{Clock, ManualClock, SystemClock};
#[doc(inline)]
pub use delete::DeleteResult;
#[doc(inline)]
pub use error::{NotepadError, Result};
#[doc(inline)]
pub use export::{export_file_name, ExportArtifact, ExportEngine, ExportFormat};
#[doc(inline)]
pub use note::{Attachment, MediaKind, Note, Payload};
#[doc(inline)]
pub use notepad::Notepad;
#[doc(inline)]
pub use object_url::ObjectUrls;
#[doc(inline)]
pub use recorder::{
    CaptureKind, FinishedRecording, MediaConstraints, MediaDevices, MediaStream, Recorder,
    RecorderState,
};
#[doc(inline)]
pub use reference::{ReferencePattern, ReferenceResolver, ReferenceToken, ResolvedContent};
#[doc(inline)]
pub use repository::{Autosave, NoteRepository, Search};
#[doc(inline)]
pub use settings::{ContentFormat, NotepadSettings, ReferenceSyntax};
#[doc(inline)]
pub use storage::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore, Storage};
