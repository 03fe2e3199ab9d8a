//! Single-note export as plain text, standalone HTML or paginated PDF.

use crate::core::blob_store::BlobStore;
use crate::core::markup::{content_to_html, content_to_text, html_escape};
use crate::core::pdf::{decode_image, render_pdf, PdfImage};
use crate::core::reference::{parse_data_uri, ReferenceResolver};
use crate::core::settings::ContentFormat;
use crate::{MediaKind, Note, NotepadError, Payload, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Base name used when a note title sanitizes to nothing.
const FALLBACK_FILE_STEM: &str = "note";

/// Characters that are not allowed in file names on at least one platform.
const RESERVED_FILE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Html,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Html => "html",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Text => "text/plain",
            ExportFormat::Html => "text/html",
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = NotepadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Text),
            "html" | "htm" => Ok(ExportFormat::Html),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(NotepadError::InvalidSettings(format!(
                "Unknown export format: {other}"
            ))),
        }
    }
}

/// A finished export, ready to be handed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Writes the artifact into `dir`, creating the directory if needed.
    ///
    /// An existing file with the same name is overwritten.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.bytes)?;
        log::info!("Exported {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

/// Turns a note title into a safe file name with the given extension.
pub fn export_file_name(title: &str, extension: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| {
            if RESERVED_FILE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let stem = cleaned.trim_matches(|c: char| c.is_whitespace() || c == '.');
    let stem = if stem.is_empty() { FALLBACK_FILE_STEM } else { stem };
    format!("{stem}.{extension}")
}

/// Renders notes into downloadable artifacts.
#[derive(Debug, Clone, Default)]
pub struct ExportEngine {
    resolver: ReferenceResolver,
    format: ContentFormat,
}

impl ExportEngine {
    pub fn new(resolver: ReferenceResolver, format: ContentFormat) -> Self {
        Self { resolver, format }
    }

    pub fn export<B: BlobStore + ?Sized>(
        &self,
        note: &Note,
        store: &B,
        format: ExportFormat,
    ) -> Result<ExportArtifact> {
        match format {
            ExportFormat::Text => Ok(self.export_text(note)),
            ExportFormat::Html => Ok(self.export_html(note, store)),
            ExportFormat::Pdf => self.export_pdf(note, store),
        }
    }

    /// The note's visible text with all markup removed.
    pub fn export_text(&self, note: &Note) -> ExportArtifact {
        let text = content_to_text(&note.content, self.format);
        artifact(note, ExportFormat::Text, text.into_bytes())
    }

    /// A self-contained HTML document with every resolvable attachment inlined.
    pub fn export_html<B: BlobStore + ?Sized>(&self, note: &Note, store: &B) -> ExportArtifact {
        let body = content_to_html(&note.content, self.format);
        let body = self.resolver.resolve_for_export(&body, store);
        let html = format!(
            "<!doctype html><html><head><meta charset=\"utf-8\">\
             <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
             <title>{}</title></head><body>{}</body></html>",
            html_escape(&note.title),
            body
        );
        artifact(note, ExportFormat::Html, html.into_bytes())
    }

    /// An A4 PDF: wrapped text first, then every image attachment in order.
    pub fn export_pdf<B: BlobStore + ?Sized>(&self, note: &Note, store: &B) -> Result<ExportArtifact> {
        let text = content_to_text(&note.content, self.format);
        let images: Vec<PdfImage> = note
            .attachments
            .iter()
            .filter(|a| a.media_kind() == MediaKind::Image)
            .filter_map(|a| load_image(store, &a.id))
            .collect();
        let bytes = render_pdf(&note.title, &text, &images)?;
        Ok(artifact(note, ExportFormat::Pdf, bytes))
    }
}

fn artifact(note: &Note, format: ExportFormat, bytes: Vec<u8>) -> ExportArtifact {
    ExportArtifact {
        file_name: export_file_name(&note.title, format.extension()),
        mime_type: format.mime_type().to_string(),
        bytes,
    }
}

fn load_image<B: BlobStore + ?Sized>(store: &B, attachment_id: &str) -> Option<PdfImage> {
    let bytes = match store.get(attachment_id) {
        Ok(Some(Payload::Binary { data, .. })) => data,
        Ok(Some(Payload::Text(text))) => match parse_data_uri(&text) {
            Some((_, data)) => data,
            None => {
                log::debug!("Attachment {attachment_id} is not embeddable, skipping");
                return None;
            }
        },
        Ok(None) => {
            log::debug!("Attachment {attachment_id} is missing, skipping");
            return None;
        }
        Err(e) => {
            log::warn!("Could not read attachment {attachment_id}: {e}");
            return None;
        }
    };
    decode_image(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::blob_store::MemoryBlobStore;
    use crate::core::reference::{to_data_uri, ReferencePattern};
    use crate::core::settings::ReferenceSyntax;
    use crate::Attachment;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use lopdf::Document;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([0, 128, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn note_with_image() -> (Note, MemoryBlobStore) {
        let mut store = MemoryBlobStore::new();
        store.put("att-1", &Payload::binary("image/png", png(10, 20))).unwrap();
        let note = Note {
            id: "note-1".to_string(),
            title: "Trip".to_string(),
            content: r#"<p>Hello</p><img src="id:att-1" />"#.to_string(),
            attachments: vec![Attachment {
                id: "att-1".to_string(),
                mime_type: "image/png".to_string(),
                display_name: Some("pic.png".to_string()),
            }],
            updated_at: 0,
        };
        (note, store)
    }

    fn count_images(doc: &Document) -> usize {
        doc.objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .filter(|s| s.dict.get(b"Subtype").and_then(|o| o.as_name()).ok() == Some(&b"Image"[..]))
            .count()
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("Shopping list", "txt"), "Shopping list.txt");
        assert_eq!(export_file_name("a/b:c*d?", "pdf"), "a_b_c_d_.pdf");
        assert_eq!(export_file_name("  ..  ", "html"), "note.html");
        assert_eq!(export_file_name("", "txt"), "note.txt");
        assert_eq!(export_file_name("tab\there", "txt"), "tab_here.txt");
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("TXT".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert_eq!("pdf".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert!("docx".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Html.to_string(), "html");
    }

    #[test]
    fn test_export_text_strips_markup() {
        let (note, _) = note_with_image();
        let artifact = ExportEngine::default().export_text(&note);

        assert_eq!(artifact.file_name, "Trip.txt");
        assert_eq!(artifact.mime_type, "text/plain");
        assert_eq!(artifact.bytes, b"Hello");
    }

    #[test]
    fn test_export_html_inlines_attachments() {
        let (note, store) = note_with_image();
        let artifact = ExportEngine::default().export_html(&note, &store);
        let html = String::from_utf8(artifact.bytes).unwrap();

        assert_eq!(artifact.file_name, "Trip.html");
        assert_eq!(artifact.mime_type, "text/html");
        assert!(html.starts_with("<!doctype html>"));
        assert!(html.contains("<meta charset=\"utf-8\">"));
        assert!(html.contains("<title>Trip</title>"));
        assert!(html.contains("<p>Hello</p>"));
        assert!(html.contains("data:image/png;base64,"));
        assert!(!html.contains("id:att-1"));
    }

    #[test]
    fn test_export_html_escapes_title() {
        let mut note = Note {
            id: "n".to_string(),
            title: "<b>&</b>".to_string(),
            content: String::new(),
            attachments: Vec::new(),
            updated_at: 0,
        };
        let html = String::from_utf8(ExportEngine::default().export_html(&note, &MemoryBlobStore::new()).bytes).unwrap();
        assert!(html.contains("<title>&lt;b&gt;&amp;&lt;/b&gt;</title>"));

        note.title = "x".to_string();
        note.content = "<p>see id:gone</p>".to_string();
        let html = String::from_utf8(ExportEngine::default().export_html(&note, &MemoryBlobStore::new()).bytes).unwrap();
        assert!(html.contains("<p>see id:gone</p>"));
    }

    #[test]
    fn test_export_markdown_note() {
        let engine = ExportEngine::new(
            ReferenceResolver::new(ReferencePattern::default(), ReferenceSyntax::Markdown),
            ContentFormat::Markdown,
        );
        let (mut note, store) = note_with_image();
        note.content = "# Trip\n\nHello ![pic](id:att-1)".to_string();

        let html = String::from_utf8(engine.export_html(&note, &store).bytes).unwrap();
        assert!(html.contains("<h1>Trip</h1>"));
        assert!(html.contains("src=\"data:image/png;base64,"));

        let text = String::from_utf8(engine.export_text(&note).bytes).unwrap();
        assert_eq!(text, "Trip\nHello pic");
    }

    #[test]
    fn test_export_pdf_with_image_fits_one_page() {
        let (note, store) = note_with_image();
        let artifact = ExportEngine::default().export_pdf(&note, &store).unwrap();

        assert_eq!(artifact.file_name, "Trip.pdf");
        assert_eq!(artifact.mime_type, "application/pdf");
        let doc = Document::load_mem(&artifact.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(count_images(&doc), 1);
    }

    #[test]
    fn test_export_pdf_reads_data_uri_payloads() {
        let (mut note, mut store) = note_with_image();
        store
            .put("att-2", &Payload::Text(to_data_uri("image/png", &png(4, 4))))
            .unwrap();
        note.attachments.push(Attachment {
            id: "att-2".to_string(),
            mime_type: "image/png".to_string(),
            display_name: None,
        });

        let artifact = ExportEngine::default().export_pdf(&note, &store).unwrap();
        let doc = Document::load_mem(&artifact.bytes).unwrap();
        assert_eq!(count_images(&doc), 2);
    }

    #[test]
    fn test_export_pdf_skips_missing_and_broken_images() {
        let (mut note, mut store) = note_with_image();
        store.put("att-bad", &Payload::binary("image/png", vec![1, 2, 3])).unwrap();
        for id in ["att-bad", "att-missing"] {
            note.attachments.push(Attachment {
                id: id.to_string(),
                mime_type: "image/png".to_string(),
                display_name: None,
            });
        }

        let artifact = ExportEngine::default().export_pdf(&note, &store).unwrap();
        let doc = Document::load_mem(&artifact.bytes).unwrap();
        assert_eq!(count_images(&doc), 1);
    }

    #[test]
    fn test_artifact_write_to() {
        let dir = TempDir::new().unwrap();
        let (note, _) = note_with_image();
        let artifact = ExportEngine::default().export_text(&note);

        let path = artifact.write_to(&dir.path().join("downloads")).unwrap();
        assert_eq!(path.file_name().unwrap(), "Trip.txt");
        assert_eq!(std::fs::read(&path).unwrap(), b"Hello");
    }
}
