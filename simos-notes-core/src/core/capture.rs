//! Turning incoming files into attachments on a note.
//!
//! Every capture follows the same order: the payload goes into the blob
//! store first, and only once that write succeeded is the attachment
//! metadata added to the note. A failed write therefore never leaves
//! metadata pointing at nothing.

use crate::core::blob_store::BlobStore;
use crate::core::reference::ReferenceResolver;
use crate::core::repository::NoteRepository;
use crate::core::storage::DocumentStore;
use crate::{Attachment, NotepadError, Payload, Result};
use uuid::Uuid;

/// A file handed to the notepad by a picker, a drop or a recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl IncomingFile {
    /// Builds an incoming file. An empty `mime_type` is guessed from `name`.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        let mut mime_type = mime_type.into();
        if mime_type.trim().is_empty() {
            mime_type = mime_guess::from_path(&name)
                .first_or_octet_stream()
                .essence_str()
                .to_string();
        }
        Self {
            name,
            mime_type,
            data,
        }
    }
}

/// Result of a single capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub attachment: Attachment,
    /// Where the next insertion should go: just past the inserted reference,
    /// or the incoming cursor when nothing was inserted.
    pub cursor: Option<usize>,
}

fn new_attachment_id() -> String {
    format!("att-{}", Uuid::new_v4())
}

/// Borrows the stores of a session for the duration of one capture.
///
/// The pipeline mutates the in-memory collection only; persisting it is left
/// to the caller.
pub struct CapturePipeline<'a, B: BlobStore + ?Sized, D: DocumentStore> {
    store: &'a mut B,
    repo: &'a mut NoteRepository<D>,
    resolver: &'a ReferenceResolver,
}

impl<'a, B: BlobStore + ?Sized, D: DocumentStore> CapturePipeline<'a, B, D> {
    pub fn new(
        store: &'a mut B,
        repo: &'a mut NoteRepository<D>,
        resolver: &'a ReferenceResolver,
    ) -> Self {
        Self {
            store,
            repo,
            resolver,
        }
    }

    /// Stores `file` as a new attachment of `note_id`.
    ///
    /// With `insert_inline`, images, videos and audio also get a reference
    /// spliced into the note content at `cursor` (the end when `None`).
    ///
    /// # Errors
    ///
    /// [`NotepadError::NoteNotFound`] if the note is gone, and
    /// [`NotepadError::CaptureFailure`] if the payload could not be stored.
    pub fn attach(
        &mut self,
        file: IncomingFile,
        note_id: &str,
        insert_inline: bool,
        cursor: Option<usize>,
        now: i64,
    ) -> Result<CaptureOutcome> {
        self.repo.require(note_id)?;

        let id = new_attachment_id();
        let size = file.data.len();
        let payload = Payload::binary(file.mime_type.clone(), file.data);
        self.store
            .put(&id, &payload)
            .map_err(|e| NotepadError::CaptureFailure(format!("{}: {e}", file.name)))?;

        let attachment = Attachment {
            id,
            mime_type: file.mime_type,
            display_name: (!file.name.is_empty()).then_some(file.name),
        };
        self.repo.add_attachment(note_id, attachment.clone(), now)?;
        log::info!(
            "Attached {} ({}, {size} bytes) to {note_id}",
            attachment.id,
            attachment.mime_type
        );

        let cursor = if insert_inline && attachment.media_kind().is_inline() {
            Some(self.splice(note_id, &attachment, cursor, now)?)
        } else {
            cursor
        };

        Ok(CaptureOutcome { attachment, cursor })
    }

    /// Attaches dropped files in order, each inserted inline after the previous one.
    ///
    /// A file that fails does not stop the rest; its error takes its place in
    /// the returned list.
    pub fn attach_many(
        &mut self,
        files: Vec<IncomingFile>,
        note_id: &str,
        cursor: Option<usize>,
        now: i64,
    ) -> Vec<Result<Attachment>> {
        let mut cursor = cursor;
        files
            .into_iter()
            .map(|file| {
                let outcome = self.attach(file, note_id, true, cursor, now)?;
                cursor = outcome.cursor;
                Ok(outcome.attachment)
            })
            .collect()
    }

    /// Inserts a reference to an attachment the note already owns.
    ///
    /// Returns the cursor just past the inserted markup.
    pub fn insert_existing(
        &mut self,
        note_id: &str,
        attachment_id: &str,
        cursor: Option<usize>,
        now: i64,
    ) -> Result<usize> {
        let attachment = self
            .repo
            .require(note_id)?
            .attachment(attachment_id)
            .cloned()
            .ok_or_else(|| NotepadError::AttachmentNotFound(attachment_id.to_string()))?;
        self.splice(note_id, &attachment, cursor, now)
    }

    fn splice(
        &mut self,
        note_id: &str,
        attachment: &Attachment,
        cursor: Option<usize>,
        now: i64,
    ) -> Result<usize> {
        let content = &self.repo.require(note_id)?.content;
        let inserted = self.resolver.insert_reference(content, attachment, cursor);
        self.repo.update_content(note_id, &inserted.content, now)?;
        Ok(inserted.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::blob_store::MemoryBlobStore;
    use crate::core::storage::MemoryDocumentStore;

    fn setup() -> (MemoryBlobStore, NoteRepository<MemoryDocumentStore>, String) {
        let mut repo = NoteRepository::open(MemoryDocumentStore::new(), 0);
        let id = repo.create(1);
        repo.update_content(&id, "<p>ab</p>", 1).unwrap();
        (MemoryBlobStore::new(), repo, id)
    }

    #[test]
    fn test_incoming_file_guesses_mime() {
        assert_eq!(IncomingFile::new("a.png", "", vec![]).mime_type, "image/png");
        assert_eq!(IncomingFile::new("clip.mp4", " ", vec![]).mime_type, "video/mp4");
        assert_eq!(
            IncomingFile::new("blob", "", vec![]).mime_type,
            "application/octet-stream"
        );
        assert_eq!(IncomingFile::new("a.png", "image/gif", vec![]).mime_type, "image/gif");
    }

    #[test]
    fn test_attach_inline_image() {
        let (mut store, mut repo, id) = setup();
        let resolver = ReferenceResolver::default();
        let file = IncomingFile::new("cat.png", "image/png", vec![1, 2, 3]);

        let outcome = CapturePipeline::new(&mut store, &mut repo, &resolver)
            .attach(file, &id, true, Some(4), 10)
            .unwrap();

        let att = &outcome.attachment;
        assert!(att.id.starts_with("att-"));
        assert_eq!(att.display_name.as_deref(), Some("cat.png"));
        assert_eq!(
            store.get(&att.id).unwrap(),
            Some(Payload::binary("image/png", vec![1, 2, 3]))
        );

        let note = repo.get(&id).unwrap();
        assert_eq!(note.attachments, vec![att.clone()]);
        assert_eq!(note.updated_at, 10);
        let expected = format!("<p>a<img src=\"id:{}\" alt=\"cat.png\" />b</p>", att.id);
        assert_eq!(note.content, expected);
        assert_eq!(&note.content[outcome.cursor.unwrap()..], "b</p>");
    }

    #[test]
    fn test_attach_other_type_is_not_inlined() {
        let (mut store, mut repo, id) = setup();
        let resolver = ReferenceResolver::default();
        let file = IncomingFile::new("doc.pdf", "application/pdf", vec![9]);

        let outcome = CapturePipeline::new(&mut store, &mut repo, &resolver)
            .attach(file, &id, true, Some(2), 10)
            .unwrap();

        assert_eq!(outcome.cursor, Some(2));
        assert_eq!(repo.get(&id).unwrap().content, "<p>ab</p>");
        assert_eq!(repo.get(&id).unwrap().attachments.len(), 1);
    }

    #[test]
    fn test_failed_put_leaves_no_metadata() {
        let (mut store, mut repo, id) = setup();
        store.set_fail_writes(true);
        let resolver = ReferenceResolver::default();
        let file = IncomingFile::new("cat.png", "image/png", vec![1]);

        let err = CapturePipeline::new(&mut store, &mut repo, &resolver)
            .attach(file, &id, true, None, 10)
            .unwrap_err();

        assert!(matches!(err, NotepadError::CaptureFailure(_)));
        let note = repo.get(&id).unwrap();
        assert!(note.attachments.is_empty());
        assert_eq!(note.content, "<p>ab</p>");
        assert!(store.is_empty());
    }

    #[test]
    fn test_attach_to_missing_note() {
        let (mut store, mut repo, _) = setup();
        let resolver = ReferenceResolver::default();
        let file = IncomingFile::new("cat.png", "image/png", vec![1]);

        let err = CapturePipeline::new(&mut store, &mut repo, &resolver)
            .attach(file, "note-gone", false, None, 10)
            .unwrap_err();

        assert!(matches!(err, NotepadError::NoteNotFound(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_attach_many_keeps_drop_order() {
        let (mut store, mut repo, id) = setup();
        let resolver = ReferenceResolver::default();
        let files = vec![
            IncomingFile::new("one.png", "image/png", vec![1]),
            IncomingFile::new("notes.txt", "text/plain", vec![2]),
            IncomingFile::new("two.webm", "video/webm", vec![3]),
        ];

        let results = CapturePipeline::new(&mut store, &mut repo, &resolver)
            .attach_many(files, &id, Some(3), 5);

        assert_eq!(results.len(), 3);
        let ids: Vec<String> = results.into_iter().map(|r| r.unwrap().id).collect();
        let content = &repo.get(&id).unwrap().content;
        let first = content.find(&ids[0]).unwrap();
        let second = content.find(&ids[2]).unwrap();
        assert!(first < second);
        assert!(!content.contains(&ids[1]));
        assert!(content.starts_with("<p><img"));
        assert!(content.ends_with("</video>ab</p>"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_insert_existing_attachment() {
        let (mut store, mut repo, id) = setup();
        let resolver = ReferenceResolver::default();
        let mut pipeline = CapturePipeline::new(&mut store, &mut repo, &resolver);
        let att = pipeline
            .attach(IncomingFile::new("song.mp3", "audio/mpeg", vec![7]), &id, false, None, 2)
            .unwrap()
            .attachment;

        let end = pipeline.insert_existing(&id, &att.id, None, 3).unwrap();
        let err = pipeline.insert_existing(&id, "att-nope", None, 3).unwrap_err();

        assert!(matches!(err, NotepadError::AttachmentNotFound(_)));
        let content = &repo.get(&id).unwrap().content;
        assert_eq!(end, content.len());
        assert!(content.ends_with(&format!("<audio controls src=\"id:{}\"></audio>", att.id)));
    }
}
