//! Conversions between note markup and plain text / HTML.

use crate::core::settings::ContentFormat;
use pulldown_cmark::{html as md_html, Event, Options, Parser, Tag, TagEnd};

// ── Escaping ─────────────────────────────────────────────────────────────────

/// Escapes HTML special characters in a user-supplied string.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ── Markdown ─────────────────────────────────────────────────────────────────

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options
}

/// Converts a CommonMark markdown string to an HTML string.
pub fn render_markdown_to_html(text: &str) -> String {
    let parser = Parser::new_ext(text, markdown_options());
    let mut html_output = String::new();
    md_html::push_html(&mut html_output, parser);
    html_output
}

/// Collects the visible text of a markdown document, one block per line.
pub fn markdown_to_text(text: &str) -> String {
    let mut out = String::new();
    for event in Parser::new_ext(text, markdown_options()) {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Start(Tag::Item) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableRow
                | TagEnd::TableHead,
            ) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::End(TagEnd::TableCell) => out.push('\t'),
            _ => {}
        }
    }
    tidy_lines(&out)
}

// ── HTML ─────────────────────────────────────────────────────────────────────

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "blockquote",
    "pre", "hr", "table", "section", "article", "header", "footer",
];

const HIDDEN_TAGS: &[&str] = &["script", "style", "head", "title"];

/// Strips tags from an HTML fragment, keeping the text a reader would see.
///
/// Block-level tags become line breaks; entities are decoded; the contents of
/// `script`, `style`, `head` and `title` are dropped.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::new();
    let mut rest = html;
    let mut hidden: Option<String> = None;

    while let Some(open) = rest.find('<') {
        if hidden.is_none() {
            push_text(&mut out, &rest[..open]);
        }
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            // Unterminated tag: treat the remainder as text.
            if hidden.is_none() {
                push_text(&mut out, &rest[open..]);
            }
            rest = "";
            break;
        };
        let tag = &after[..close];
        rest = &after[close + 1..];

        let closing = tag.starts_with('/');
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        if let Some(hidden_name) = &hidden {
            if closing && *hidden_name == name {
                hidden = None;
            }
            continue;
        }
        if !closing && HIDDEN_TAGS.contains(&name.as_str()) && !tag.ends_with('/') {
            hidden = Some(name);
            continue;
        }
        if BLOCK_TAGS.contains(&name.as_str()) && !out.ends_with('\n') && !out.is_empty() {
            out.push('\n');
        }
    }
    if hidden.is_none() {
        push_text(&mut out, rest);
    }
    tidy_lines(&out)
}

fn push_text(out: &mut String, raw: &str) {
    let decoded = decode_entities(raw);
    let mut last_space = out.ends_with(' ') || out.ends_with('\n') || out.is_empty();
    for c in decoded.chars() {
        if c.is_whitespace() && c != '\u{a0}' {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(if c == '\u{a0}' { ' ' } else { c });
            last_space = false;
        }
    }
}

/// Decodes the named entities a rich-text widget emits plus numeric references.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Trims every line, collapses runs of blank lines, and trims the whole text.
fn tidy_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

/// Plain text of note content in the given format.
pub fn content_to_text(content: &str, format: ContentFormat) -> String {
    match format {
        ContentFormat::Html => html_to_text(content),
        ContentFormat::Markdown => markdown_to_text(content),
    }
}

/// HTML body for note content in the given format.
pub fn content_to_html(content: &str, format: ContentFormat) -> String {
    match format {
        ContentFormat::Html => content.to_string(),
        ContentFormat::Markdown => render_markdown_to_html(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_paragraphs() {
        let text = html_to_text("<p>Hello <b>world</b></p><p>Second&nbsp;line</p>");
        assert_eq!(text, "Hello world\nSecond line");
    }

    #[test]
    fn test_html_to_text_drops_media_and_scripts() {
        let text = html_to_text(
            r#"<p>Hi <img src="id:att-1" alt="x" /></p><script>alert(1)</script><video controls src="id:att-2"></video>"#,
        );
        assert_eq!(text, "Hi");
    }

    #[test]
    fn test_html_to_text_lists_and_breaks() {
        let text = html_to_text("<ol><li>one</li><li>two</li></ol>a<br>b");
        assert_eq!(text, "one\ntwo\na\nb");
    }

    #[test]
    fn test_html_to_text_plain_input() {
        assert_eq!(html_to_text("just text"), "just text");
        assert_eq!(html_to_text("a < b"), "a < b");
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#65;&#x42;"), "a & b <c> AB");
        assert_eq!(decode_entities("AT&T; fish & chips"), "AT&T; fish & chips");
    }

    #[test]
    fn test_markdown_to_text() {
        let text = markdown_to_text("# Title\n\nSome **bold** text.\n\n- one\n- two\n");
        assert_eq!(text, "Title\nSome bold text.\none\ntwo");
    }

    #[test]
    fn test_render_markdown_heading() {
        let html = render_markdown_to_html("# Hello");
        assert!(html.contains("<h1>Hello</h1>"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape(r#"<a href="x">&"#), "&lt;a href=&quot;x&quot;&gt;&amp;");
    }
}
