//! Body extraction: pick the best textual representation of a message.
//!
//! Plain-text parts win over HTML. HTML is converted to text only when no
//! plain text exists. The result is trimmed and capped for preview.

use tracing::debug;

use crate::model::mail::{MessageBody, Payload, RawMessage};
use crate::parser::charset::{self, Malformed};

/// Default preview cap, in characters.
pub const DEFAULT_BODY_CAP: usize = 2000;

/// Appended after the cap boundary when a body is truncated.
pub const TRUNCATION_MARKER: &str = "\n\n...[truncated]";

/// Extract the preview text of a message. Never fails.
pub fn extract_body(message: &RawMessage, cap: usize) -> String {
    let text = match &message.body {
        MessageBody::Single(payload) => decode_payload(payload),
        multipart @ MessageBody::Multipart(_) => {
            let mut candidates = Candidates::default();
            candidates.collect(multipart);
            candidates.select()
        }
    };
    truncate_preview(&text, cap)
}

/// The two candidate slots filled while walking a multipart tree.
#[derive(Debug, Default)]
struct Candidates {
    /// Every non-attachment `text/plain` part, concatenated in document order.
    plain: String,
    /// The first non-attachment `text/html` part seen while `plain` was still empty.
    html: Option<String>,
}

impl Candidates {
    fn collect(&mut self, body: &MessageBody) {
        match body {
            MessageBody::Multipart(parts) => {
                for part in parts {
                    self.collect(part);
                }
            }
            MessageBody::Single(payload) => {
                if payload.is_attachment() {
                    debug!(content_type = %payload.content_type, "Skipping attachment");
                    return;
                }
                match payload.content_type.as_str() {
                    "text/plain" => self.plain.push_str(&decode_payload(payload)),
                    "text/html" if self.plain.is_empty() && self.html.is_none() => {
                        self.html = Some(decode_payload(payload));
                    }
                    _ => {}
                }
            }
        }
    }

    /// Plain text if any was accumulated, else converted HTML, else nothing.
    fn select(self) -> String {
        if !self.plain.is_empty() {
            self.plain
        } else if let Some(html) = self.html {
            html_to_text(&html)
        } else {
            String::new()
        }
    }
}

/// Decode a payload with its declared charset, replacing invalid bytes.
fn decode_payload(payload: &Payload) -> String {
    charset::decode_with_fallback(payload.charset.as_deref(), &payload.data, Malformed::Replace)
}

/// Trim and cap `text` at `cap` characters, appending [`TRUNCATION_MARKER`] on overflow.
pub fn truncate_preview(text: &str, cap: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(cap) {
        Some((boundary, _)) => {
            let mut preview = String::with_capacity(boundary + TRUNCATION_MARKER.len());
            preview.push_str(&trimmed[..boundary]);
            preview.push_str(TRUNCATION_MARKER);
            preview
        }
        None => trimmed.to_string(),
    }
}

/// Elements that start a new line in the text rendering.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "footer", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section", "table", "td", "th",
    "title", "tr", "ul",
];

/// Convert HTML to plain text. Never fails.
///
/// `<script>` and `<style>` blocks are dropped with their content, other tags
/// are stripped, block elements become line breaks, entities are decoded,
/// and blank lines are removed. A `<` that does not open a well-formed tag is
/// kept as text, and an unterminated comment runs to the end of the input.
pub fn html_to_text(html: &str) -> String {
    let html = remove_tag_block(html, "script");
    let html = remove_tag_block(&html, "style");

    let mut text = String::with_capacity(html.len());
    let mut rest = html.as_str();
    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let tag_and_after = &rest[open..];

        if let Some(comment) = tag_and_after.strip_prefix("<!--") {
            rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
            continue;
        }

        match tag_end(tag_and_after) {
            Some(close) => {
                let name = tag_name(&tag_and_after[1..close]);
                if BLOCK_TAGS.contains(&name.as_str()) {
                    text.push('\n');
                }
                rest = &tag_and_after[close + 1..];
            }
            None => {
                text.push('<');
                rest = &tag_and_after[1..];
            }
        }
    }
    text.push_str(rest);

    let text = decode_entities(&text);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines.join("\n")
}

/// Index of the `>` closing the tag that starts at `s[0] == '<'`.
///
/// `None` unless the `<` is followed by a letter, `/`, `!` or `?` and a `>`
/// comes before any other `<`.
fn tag_end(s: &str) -> Option<usize> {
    let after = &s[1..];
    let first = after.chars().next()?;
    if !(first.is_ascii_alphabetic() || matches!(first, '/' | '!' | '?')) {
        return None;
    }
    let close = after.find('>')?;
    if after[..close].contains('<') {
        return None;
    }
    Some(close + 1)
}

/// Lowercase element name of a tag body such as `/P`, `br/` or `a href=".."`.
fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitively.
///
/// An unclosed block swallows the rest of the document.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}");

    let mut result = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(found) = lower[pos..].find(&open) {
        let start = pos + found;
        // Only a whole element name counts: <style>, <style ...>, not <styles>
        let next = lower[start + open.len()..].chars().next();
        if next.is_some_and(|c| c.is_ascii_alphanumeric() || c == '-') {
            result.push_str(&html[pos..start + open.len()]);
            pos = start + open.len();
            continue;
        }
        result.push_str(&html[pos..start]);
        pos = match lower[start..].find(&close) {
            Some(end) => {
                let close_start = start + end;
                lower[close_start..]
                    .find('>')
                    .map_or(html.len(), |gt| close_start + gt + 1)
            }
            None => html.len(),
        };
    }
    result.push_str(&html[pos..]);
    result
}

/// Decode named and numeric HTML entities commonly found in mail.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .filter(|&semi| semi > 0 && semi <= 10)
            .and_then(|semi| entity_char(&after[..semi]).map(|c| (c, semi)));
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity_char(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "copy" => Some('©'),
        "reg" => Some('®'),
        "hellip" => Some('…'),
        "mdash" => Some('—'),
        "ndash" => Some('–'),
        "rsquo" => Some('’'),
        "lsquo" => Some('‘'),
        "rdquo" => Some('”'),
        "ldquo" => Some('“'),
        _ => None,
    }
}
