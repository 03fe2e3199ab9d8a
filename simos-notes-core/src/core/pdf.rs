//! Paginated PDF rendering of note text and images.
//!
//! Layout and rendering are separate steps: [`layout`] decides what goes on
//! which page in millimetres, [`render_pdf`] turns that plan into a `lopdf`
//! document.

use crate::{NotepadError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 20.0;
pub const LINE_HEIGHT_MM: f32 = 7.0;
pub const FONT_SIZE_PT: f32 = 12.0;

const PRINTABLE_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
const PRINTABLE_BOTTOM_MM: f32 = PAGE_HEIGHT_MM - MARGIN_MM;
const PRINTABLE_HEIGHT_MM: f32 = PAGE_HEIGHT_MM - 2.0 * MARGIN_MM;
/// Distance from the top of a line box to the text baseline.
const BASELINE_OFFSET_MM: f32 = 5.0;
const PT_PER_MM: f32 = 72.0 / 25.4;
/// CSS pixels are 1/96 inch.
const MM_PER_PX: f32 = 25.4 / 96.0;
const EPSILON: f32 = 0.001;

/// A line of text anchored at `y_mm` from the top of its page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub y_mm: f32,
}

/// An image placed on a page; `index` points into the input image list.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImage {
    pub index: usize,
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub lines: Vec<PlacedLine>,
    pub images: Vec<PlacedImage>,
}

/// Pixel dimensions of an image to be laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width_px: u32,
    pub height_px: u32,
}

/// Decoded RGB image ready for embedding.
#[derive(Debug, Clone)]
pub struct PdfImage {
    pub width_px: u32,
    pub height_px: u32,
    /// Packed 8-bit RGB rows.
    pub rgb: Vec<u8>,
}

impl PdfImage {
    pub fn size(&self) -> ImageSize {
        ImageSize {
            width_px: self.width_px,
            height_px: self.height_px,
        }
    }
}

/// Decodes PNG/JPEG/GIF/WebP bytes, flattening any transparency onto white.
pub fn decode_image(bytes: &[u8]) -> Option<PdfImage> {
    let decoded = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            log::warn!("Skipping undecodable image: {e}");
            return None;
        }
    };
    let rgba = decoded.to_rgba8();
    let (width_px, height_px) = rgba.dimensions();
    let mut rgb = Vec::with_capacity(width_px as usize * height_px as usize * 3);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            let blended = (u16::from(channel) * alpha + 255 * (255 - alpha)) / 255;
            rgb.push(blended as u8);
        }
    }
    Some(PdfImage {
        width_px,
        height_px,
        rgb,
    })
}

/// Approximate Helvetica advance width in 1/1000 em.
fn glyph_width(c: char) -> u32 {
    match c {
        '\'' => 191,
        'i' | 'j' | 'l' => 222,
        '|' => 260,
        ' ' | 'f' | 't' | 'I' | '!' | ',' | '.' | ':' | ';' | '/' | '[' | ']' | '\\' => 278,
        'r' | '-' | '(' | ')' | '`' => 333,
        'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' | 'J' => 500,
        'm' | 'M' => 833,
        'w' => 722,
        'W' => 944,
        'F' | 'T' | 'Z' => 611,
        'C' | 'D' | 'H' | 'N' | 'R' | 'U' => 722,
        'G' | 'O' | 'Q' => 778,
        c if c.is_ascii_uppercase() => 667,
        _ => 556,
    }
}

/// Rendered width of `text` in millimetres at [`FONT_SIZE_PT`].
pub fn text_width_mm(text: &str) -> f32 {
    let units: u32 = text.chars().map(glyph_width).sum();
    units as f32 / 1000.0 * FONT_SIZE_PT / PT_PER_MM
}

/// Greedy word wrap of `text` to `max_width_mm`. Existing line breaks are kept.
pub fn wrap_text(text: &str, max_width_mm: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let paragraph = paragraph.replace('\t', "    ");
        let paragraph = paragraph.trim_end();
        if paragraph.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        for word in paragraph.split(' ') {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if text_width_mm(&candidate) <= max_width_mm {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            // Words wider than a full line are broken by character.
            for c in word.chars() {
                current.push(c);
                if text_width_mm(&current) > max_width_mm && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(c);
                }
            }
        }
        lines.push(current);
    }
    lines
}

/// Size of an image in millimetres: natural size, scaled down to fit the printable area.
fn fitted_size(size: ImageSize) -> Option<(f32, f32)> {
    if size.width_px == 0 || size.height_px == 0 {
        return None;
    }
    let width = size.width_px as f32 * MM_PER_PX;
    let height = size.height_px as f32 * MM_PER_PX;
    let scale = (PRINTABLE_WIDTH_MM / width)
        .min(PRINTABLE_HEIGHT_MM / height)
        .min(1.0);
    Some((width * scale, height * scale))
}

/// Plans the pages: wrapped text first, then each image in order.
///
/// A new page starts whenever the next line or image would cross the bottom
/// margin. An empty document still has one page.
pub fn layout(text: &str, images: &[ImageSize]) -> Vec<PageLayout> {
    let mut pages = vec![PageLayout::default()];
    let mut y = MARGIN_MM;

    let lines = if text.trim().is_empty() {
        Vec::new()
    } else {
        wrap_text(text.trim_end(), PRINTABLE_WIDTH_MM)
    };

    for line in lines {
        if y + LINE_HEIGHT_MM > PRINTABLE_BOTTOM_MM + EPSILON {
            pages.push(PageLayout::default());
            y = MARGIN_MM;
        }
        if let Some(page) = pages.last_mut() {
            page.lines.push(PlacedLine { text: line, y_mm: y });
        }
        y += LINE_HEIGHT_MM;
    }

    for (index, size) in images.iter().enumerate() {
        let Some((width_mm, height_mm)) = fitted_size(*size) else {
            continue;
        };
        if y + height_mm > PRINTABLE_BOTTOM_MM + EPSILON && y > MARGIN_MM + EPSILON {
            pages.push(PageLayout::default());
            y = MARGIN_MM;
        }
        if let Some(page) = pages.last_mut() {
            page.images.push(PlacedImage {
                index,
                x_mm: MARGIN_MM,
                y_mm: y,
                width_mm,
                height_mm,
            });
        }
        y += height_mm + LINE_HEIGHT_MM;
    }

    pages
}

fn pt(mm: f32) -> f32 {
    mm * PT_PER_MM
}

/// Encodes text for the WinAnsi Helvetica font; unsupported characters become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn pdf_error(e: impl std::fmt::Display) -> NotepadError {
    NotepadError::Pdf(e.to_string())
}

/// Builds a complete PDF for `text` followed by `images`.
pub fn render_pdf(title: &str, text: &str, images: &[PdfImage]) -> Result<Vec<u8>> {
    let sizes: Vec<ImageSize> = images.iter().map(PdfImage::size).collect();
    let pages = layout(text, &sizes);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut image_ids: Vec<Option<ObjectId>> = vec![None; images.len()];
    let mut page_ids = Vec::with_capacity(pages.len());

    for page in &pages {
        let mut operations = Vec::new();
        for line in &page.lines {
            if line.text.is_empty() {
                continue;
            }
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE_PT.into()]));
            operations.push(Operation::new(
                "Td",
                vec![
                    pt(MARGIN_MM).into(),
                    pt(PAGE_HEIGHT_MM - line.y_mm - BASELINE_OFFSET_MM).into(),
                ],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(&line.text), StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        let mut xobjects = Dictionary::new();
        for placed in &page.images {
            let image = &images[placed.index];
            let existing = image_ids[placed.index];
            let image_id = match existing {
                Some(id) => id,
                None => {
                    let stream = Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                            "Width" => i64::from(image.width_px),
                            "Height" => i64::from(image.height_px),
                            "ColorSpace" => "DeviceRGB",
                            "BitsPerComponent" => 8,
                        },
                        image.rgb.clone(),
                    );
                    let id = doc.add_object(stream);
                    image_ids[placed.index] = Some(id);
                    id
                }
            };
            let name = format!("Im{}", placed.index);
            xobjects.set(name.clone(), Object::Reference(image_id));

            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![
                    pt(placed.width_mm).into(),
                    0.into(),
                    0.into(),
                    pt(placed.height_mm).into(),
                    pt(placed.x_mm).into(),
                    pt(PAGE_HEIGHT_MM - placed.y_mm - placed.height_mm).into(),
                ],
            ));
            operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
            operations.push(Operation::new("Q", vec![]));
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(pdf_error)?,
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => xobjects,
            },
        });
        page_ids.push(page_id);
    }

    let page_count = i64::try_from(page_ids.len()).map_err(pdf_error)?;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => page_count,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                pt(PAGE_WIDTH_MM).into(),
                pt(PAGE_HEIGHT_MM).into(),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(encode_win_ansi(title), StringFormat::Literal),
        "Producer" => Object::string_literal("simos-notes"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(pdf_error)?;
    Ok(out)
}
