//! Symbolic attachment references (`id:<attachmentId>`) inside note content.
//!
//! Matching is centralised in [`ReferencePattern`]: [`ReferencePattern::tokens`]
//! finds every reference and [`substitute`] rewrites a chosen set of them. The
//! resolver builds display and export rendering on top of that pair, so the
//! surrounding markup (HTML attributes, Markdown links, bare text) never
//! matters.

use crate::core::blob_store::BlobStore;
use crate::core::object_url::ObjectUrls;
use crate::core::settings::ReferenceSyntax;
use crate::{Attachment, MediaKind, NotepadError, Payload, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// Marker that prefixes an attachment ID in note content.
pub const DEFAULT_REFERENCE_MARKER: &str = "id:";

/// Characters allowed in an attachment ID after the marker.
const ID_CHARS: &str = "[A-Za-z0-9_-]+";

/// The rule that recognises symbolic references.
#[derive(Debug, Clone)]
pub struct ReferencePattern {
    marker: String,
    regex: Regex,
}

impl ReferencePattern {
    /// Builds a pattern for `marker` followed by an attachment ID.
    ///
    /// A marker that starts with a word character only matches at a word
    /// boundary, so `valid:x` is not read as a reference to `x`.
    pub fn new(marker: &str) -> Result<Self> {
        if marker.is_empty() {
            return Err(NotepadError::InvalidSettings(
                "Reference marker must not be empty".to_string(),
            ));
        }
        let boundary = match marker.chars().next() {
            Some(c) if c.is_alphanumeric() || c == '_' => r"\b",
            _ => "",
        };
        let source = format!("{boundary}{}({ID_CHARS})", regex::escape(marker));
        let regex = Regex::new(&source)
            .map_err(|e| NotepadError::InvalidSettings(format!("Bad reference marker: {e}")))?;
        Ok(Self {
            marker: marker.to_string(),
            regex,
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// The symbolic reference text for `attachment_id`.
    pub fn reference(&self, attachment_id: &str) -> String {
        format!("{}{}", self.marker, attachment_id)
    }

    /// Every reference in `content`, in order of appearance.
    pub fn tokens(&self, content: &str) -> Vec<ReferenceToken> {
        self.regex
            .captures_iter(content)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let id = caps.get(1)?;
                Some(ReferenceToken {
                    range: whole.range(),
                    attachment_id: id.as_str().to_string(),
                })
            })
            .collect()
    }
}

impl Default for ReferencePattern {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_MARKER).expect("default reference marker is a valid pattern")
    }
}

/// One symbolic reference found in content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceToken {
    /// Byte range of the whole reference, marker included.
    pub range: Range<usize>,
    pub attachment_id: String,
}

/// Replaces each token for which `lookup` returns a value. Other tokens are kept verbatim.
///
/// `tokens` must be in order and non-overlapping, as [`ReferencePattern::tokens`] returns them.
pub fn substitute(
    content: &str,
    tokens: &[ReferenceToken],
    lookup: impl FnMut(&str) -> Option<String>,
) -> String {
    substitute_placed(content, tokens, lookup).0
}

/// Where a token ended up in the output of [`substitute_placed`].
struct Placement {
    range: Range<usize>,
    attachment_id: String,
    replaced: bool,
}

fn substitute_placed(
    content: &str,
    tokens: &[ReferenceToken],
    mut lookup: impl FnMut(&str) -> Option<String>,
) -> (String, Vec<Placement>) {
    let mut out = String::with_capacity(content.len());
    let mut placements = Vec::with_capacity(tokens.len());
    let mut last = 0;
    for token in tokens {
        out.push_str(&content[last..token.range.start]);
        let start = out.len();
        let replaced = match lookup(&token.attachment_id) {
            Some(value) => {
                out.push_str(&value);
                true
            }
            None => {
                out.push_str(&content[token.range.clone()]);
                false
            }
        };
        placements.push(Placement {
            range: start..out.len(),
            attachment_id: token.attachment_id.clone(),
            replaced,
        });
        last = token.range.end;
    }
    out.push_str(&content[last..]);
    (out, placements)
}

/// Encodes bytes as a `data:` URI.
pub fn to_data_uri(mime_type: &str, data: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(data))
}

/// Decodes a `data:` URI into its MIME type and bytes.
pub fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.trim().strip_prefix("data:")?;
    let (meta, body) = rest.split_once(',')?;
    match meta.strip_suffix(";base64") {
        Some(mime) => BASE64
            .decode(body.trim())
            .ok()
            .map(|data| (mime.to_string(), data)),
        None => Some((meta.to_string(), body.as_bytes().to_vec())),
    }
}

/// Content after display resolution, plus the object URLs it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub content: String,
    /// URLs created for this render; revoke them once the preview is gone.
    pub object_urls: Vec<String>,
}

/// Content after an attachment reference was spliced in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedReference {
    pub content: String,
    /// Byte offset just past the inserted markup.
    pub end: usize,
}

/// Translates between symbolic references and concrete resource locations.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    pattern: ReferencePattern,
    syntax: ReferenceSyntax,
}

impl ReferenceResolver {
    pub fn new(pattern: ReferencePattern, syntax: ReferenceSyntax) -> Self {
        Self { pattern, syntax }
    }

    pub fn pattern(&self) -> &ReferencePattern {
        &self.pattern
    }

    pub fn syntax(&self) -> ReferenceSyntax {
        self.syntax
    }

    pub fn find_references(&self, content: &str) -> Vec<ReferenceToken> {
        self.pattern.tokens(content)
    }

    /// Distinct referenced attachment IDs, in order of first appearance.
    pub fn referenced_ids(&self, content: &str) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for token in self.pattern.tokens(content) {
            if !ids.contains(&token.attachment_id) {
                ids.push(token.attachment_id);
            }
        }
        ids
    }

    /// Markup referencing `attachment` in the configured syntax.
    pub fn reference_markup(&self, attachment: &Attachment) -> String {
        let src = self.pattern.reference(&attachment.id);
        let name = attachment.display_name.as_deref().unwrap_or("");
        match self.syntax {
            ReferenceSyntax::Html => match attachment.media_kind() {
                MediaKind::Image if name.is_empty() => format!("<img src=\"{src}\" />"),
                MediaKind::Image => {
                    format!("<img src=\"{src}\" alt=\"{}\" />", escape_attribute(name))
                }
                MediaKind::Video => format!("<video controls src=\"{src}\"></video>"),
                MediaKind::Audio => format!("<audio controls src=\"{src}\"></audio>"),
                MediaKind::Other => {
                    let label = if name.is_empty() { "file" } else { name };
                    format!(
                        "<a href=\"{src}\" download=\"{}\">{}</a>",
                        escape_attribute(label),
                        escape_text(label)
                    )
                }
            },
            ReferenceSyntax::Markdown => {
                let label = if name.is_empty() {
                    match attachment.media_kind() {
                        MediaKind::Image => "image",
                        MediaKind::Video => "video",
                        MediaKind::Audio => "audio",
                        MediaKind::Other => "file",
                    }
                } else {
                    name
                };
                let label = label.replace('[', "\\[").replace(']', "\\]");
                match attachment.media_kind() {
                    MediaKind::Image => format!("![{label}]({src})"),
                    _ => format!("[{label}]({src})"),
                }
            }
        }
    }

    /// Splices a reference to `attachment` into `content`.
    ///
    /// `position` is a byte offset; it is clamped to the content and moved
    /// back to the nearest char boundary. `None` appends at the end.
    pub fn insert_reference(
        &self,
        content: &str,
        attachment: &Attachment,
        position: Option<usize>,
    ) -> InsertedReference {
        let mut at = position.unwrap_or(content.len()).min(content.len());
        while !content.is_char_boundary(at) {
            at -= 1;
        }
        let markup = self.reference_markup(attachment);
        let mut out = String::with_capacity(content.len() + markup.len());
        out.push_str(&content[..at]);
        out.push_str(&markup);
        out.push_str(&content[at..]);
        InsertedReference {
            content: out,
            end: at + markup.len(),
        }
    }

    /// Resolves references to renderable handles for on-screen preview.
    ///
    /// Binary payloads become object URLs registered in `urls`; text payloads
    /// are substituted as-is. Missing attachments stay symbolic.
    pub fn resolve_for_display<B: BlobStore + ?Sized>(
        &self,
        content: &str,
        store: &B,
        urls: &mut ObjectUrls,
    ) -> ResolvedContent {
        let mut object_urls = Vec::new();
        let content = self.resolve_with(content, store, |payload| match payload {
            Payload::Binary { mime_type, data } => {
                let url = urls.create(&mime_type, data);
                object_urls.push(url.clone());
                Some(url)
            }
            Payload::Text(text) => Some(text),
        });
        let (object_urls, unused): (Vec<String>, Vec<String>) = object_urls
            .into_iter()
            .partition(|url| content.contains(url.as_str()));
        urls.revoke_all(&unused);
        ResolvedContent {
            content,
            object_urls,
        }
    }

    /// Resolves references to self-contained `data:` URIs for exported artifacts.
    pub fn resolve_for_export<B: BlobStore + ?Sized>(&self, content: &str, store: &B) -> String {
        self.resolve_with(content, store, |payload| match payload {
            Payload::Binary { mime_type, data } => Some(to_data_uri(&mime_type, &data)),
            Payload::Text(text) => Some(text),
        })
    }

    /// Substitutes every reference `render` can produce a value for.
    ///
    /// A value is never allowed to combine with the text around it into a
    /// reference that was not there before; such references stay symbolic.
    /// The result is a fixed point, so resolving it again changes nothing.
    fn resolve_with<B: BlobStore + ?Sized>(
        &self,
        content: &str,
        store: &B,
        mut render: impl FnMut(Payload) -> Option<String>,
    ) -> String {
        let mut rendered: HashMap<String, Option<String>> = HashMap::new();
        let mut current = content.to_string();
        let mut remaining = usize::MAX;
        loop {
            let tokens = self.pattern.tokens(&current);
            if tokens.is_empty() || tokens.len() >= remaining {
                return current;
            }
            remaining = tokens.len();

            for token in &tokens {
                if !rendered.contains_key(&token.attachment_id) {
                    let value = self.render_reference(&token.attachment_id, store, &mut render);
                    rendered.insert(token.attachment_id.clone(), value);
                }
            }
            let next = self.substitute_without_joins(&current, &tokens, &rendered);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn render_reference<B: BlobStore + ?Sized>(
        &self,
        attachment_id: &str,
        store: &B,
        render: &mut impl FnMut(Payload) -> Option<String>,
    ) -> Option<String> {
        match store.get(attachment_id) {
            Ok(Some(Payload::Text(text))) if !self.pattern.tokens(&text).is_empty() => {
                log::warn!("Text payload {attachment_id} contains a reference, leaving it unresolved");
                None
            }
            Ok(Some(payload)) => render(payload),
            Ok(None) => {
                log::debug!("Attachment {attachment_id} is missing, skipping");
                None
            }
            Err(e) => {
                log::warn!("Could not read attachment {attachment_id}: {e}");
                None
            }
        }
    }

    /// One substitution pass in which no reference is created by joining a
    /// value with its neighbours. Values that would do so are dropped and the
    /// pass is repeated.
    fn substitute_without_joins(
        &self,
        content: &str,
        tokens: &[ReferenceToken],
        rendered: &HashMap<String, Option<String>>,
    ) -> String {
        let mut blocked: HashSet<String> = HashSet::new();
        loop {
            let (out, placements) = substitute_placed(content, tokens, |id| {
                if blocked.contains(id) {
                    None
                } else {
                    rendered.get(id).cloned().flatten()
                }
            });

            let mut culprits = Vec::new();
            for token in self.pattern.tokens(&out) {
                if placements
                    .iter()
                    .any(|p| !p.replaced && p.range == token.range)
                {
                    continue;
                }
                culprits.extend(
                    placements
                        .iter()
                        .filter(|p| {
                            p.replaced
                                && p.range.start <= token.range.end
                                && token.range.start <= p.range.end
                        })
                        .map(|p| p.attachment_id.clone()),
                );
            }
            if culprits.is_empty() {
                return out;
            }
            for id in culprits {
                if blocked.insert(id.clone()) {
                    log::warn!("Value of {id} would form a new reference, leaving it unresolved");
                }
            }
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
