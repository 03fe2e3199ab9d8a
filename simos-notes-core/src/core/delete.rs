//! Result type for note removal.
//!
//! Deleting a note also retires its attachments and may move the active
//! selection; [`DeleteResult`] carries everything a caller needs to follow up.
//!
//! ## Serialization
//!
//! Fields serialize in camelCase (`deletedId`, `attachmentIds`, `activeId`),
//! consistent with the persisted note collection.
//!
//! ```rust
//! use simos_notes_core::DeleteResult;
//!
//! let result = DeleteResult {
//!     deleted_id: "note-a".to_string(),
//!     attachment_ids: vec!["att-1".to_string()],
//!     active_id: Some("note-b".to_string()),
//! };
//! let json = serde_json::to_string(&result).unwrap();
//! assert!(json.contains("deletedId"));
//! assert!(json.contains("activeId"));
//! ```

use serde::{Deserialize, Serialize};

/// The outcome of deleting a note from the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// ID of the note that was removed.
    pub deleted_id: String,

    /// IDs of the attachments the removed note owned, in insertion order.
    pub attachment_ids: Vec<String>,

    /// The active note after the deletion, or `None` if the collection is now empty.
    pub active_id: Option<String>,
}
