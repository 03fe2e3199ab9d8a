use serde::{Deserialize, Serialize};

/// Metadata for a payload captured into a note.
///
/// The bytes themselves live in the blob store under [`Attachment::id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Attachment {
    #[must_use]
    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime_type)
    }
}

/// Coarse classification of a MIME type, used to pick inline markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaKind {
    #[must_use]
    pub fn from_mime(mime_type: &str) -> Self {
        let lower = mime_type.to_ascii_lowercase();
        if lower.starts_with("image/") {
            Self::Image
        } else if lower.starts_with("video/") {
            Self::Video
        } else if lower.starts_with("audio/") {
            Self::Audio
        } else {
            Self::Other
        }
    }

    /// Whether a reference to this kind can be embedded inline in note content.
    #[must_use]
    pub fn is_inline(self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// A single note in the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Unix milliseconds.
    pub updated_at: i64,
}

impl Note {
    #[must_use]
    pub fn attachment(&self, attachment_id: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.id == attachment_id)
    }
}

/// The stored form of an attachment: raw bytes with their type, or a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Binary { mime_type: String, data: Vec<u8> },
    Text(String),
}

impl Payload {
    #[must_use]
    pub fn binary(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Binary {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Size of the payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Binary { data, .. } => data.len(),
            Self::Text(text) => text.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_serializes_camel_case() {
        let note = Note {
            id: "note-1".to_string(),
            title: "Shopping".to_string(),
            content: "<p>milk</p>".to_string(),
            attachments: vec![Attachment {
                id: "att-1".to_string(),
                mime_type: "image/png".to_string(),
                display_name: None,
            }],
            updated_at: 1_700_000_000_000,
        };

        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("\"updatedAt\":1700000000000"));
        assert!(json.contains("\"mimeType\":\"image/png\""));
        assert!(!json.contains("displayName"));

        let parsed: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, note);
    }

    #[test]
    fn test_missing_attachments_default_to_empty() {
        let json = r#"{"id":"n","title":"t","content":"","updatedAt":1}"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert!(note.attachments.is_empty());
    }

    #[test]
    fn test_media_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("VIDEO/webm"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("audio/webm"), MediaKind::Audio);
        assert_eq!(MediaKind::from_mime("application/pdf"), MediaKind::Other);
        assert!(!MediaKind::Other.is_inline());
    }
}
