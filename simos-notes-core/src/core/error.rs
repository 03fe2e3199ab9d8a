//! Error types for the SimOS Notepad core library.

use thiserror::Error;

/// All errors that can occur within the Notepad core library.
#[derive(Debug, Error)]
pub enum NotepadError {
    /// The underlying key-value storage rejected a read or write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A SQLite operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored note data could not be serialized or deserialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Access to a capture device was refused by the user or the platform.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Registering a captured payload as an attachment failed.
    #[error("Capture failed: {0}")]
    CaptureFailure(String),

    /// A note ID was requested that does not exist in the collection.
    #[error("Note not found: {0}")]
    NoteNotFound(String),

    /// An attachment ID was requested that its note does not own.
    #[error("Attachment not found: {0}")]
    AttachmentNotFound(String),

    /// A live recording was started while another one is still running.
    #[error("A recording is already in progress")]
    RecordingInProgress,

    /// A recording operation was requested while the recorder is idle.
    #[error("No recording is in progress")]
    NotRecording,

    /// PDF document assembly failed.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Convenience alias that pins the error type to [`NotepadError`].
pub type Result<T> = std::result::Result<T, NotepadError>;

impl NotepadError {
    /// Returns `true` for the persistence failures that leave in-memory state valid.
    #[must_use]
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Database(_) | Self::Json(_) | Self::Io(_)
        )
    }

    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Storage(e) => format!("Failed to save: {e}"),
            Self::Database(e) => format!("Failed to save: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
            Self::Io(e) => format!("File error: {e}"),
            Self::PermissionDenied(_) => "Device access denied or not available.".to_string(),
            Self::CaptureFailure(e) => format!("Could not add attachment: {e}"),
            Self::NoteNotFound(_) => "Note no longer exists".to_string(),
            Self::AttachmentNotFound(_) => "Attachment no longer exists".to_string(),
            Self::RecordingInProgress => "Stop the current recording first.".to_string(),
            Self::NotRecording => "Nothing is being recorded.".to_string(),
            Self::Pdf(e) => format!("PDF export failed: {e}"),
            Self::InvalidSettings(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_failure_family() {
        assert!(NotepadError::Storage("quota".into()).is_storage_failure());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert!(NotepadError::Io(io).is_storage_failure());
        assert!(!NotepadError::PermissionDenied("mic".into()).is_storage_failure());
        assert!(!NotepadError::CaptureFailure("x".into()).is_storage_failure());
    }

    #[test]
    fn test_permission_denied_message() {
        let e = NotepadError::PermissionDenied("camera".into());
        assert!(e.user_message().contains("denied"));
        assert!(e.to_string().contains("camera"));
    }
}
