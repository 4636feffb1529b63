//! MIME structure parsing: raw message bytes into a [`RawMessage`] part tree.
//!
//! Structure and transfer decoding come from `mailparse`. Payloads keep their
//! charset-undecoded bytes next to the declared charset, so text decoding
//! stays in [`parser::charset`](crate::parser::charset).

use mailparse::{MailHeader, MailHeaderMap, ParsedMail};
use tracing::{debug, warn};

use crate::model::mail::{MessageBody, Payload, RawMessage};
use crate::parser::header;

/// Maximum depth for recursive multipart parsing (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 10;

/// Parse a complete raw message (headers + body) into a [`RawMessage`].
///
/// A leading MBOX `From ` line and UTF-8 BOM are skipped. Never fails: input
/// that `mailparse` rejects becomes a single plain-text payload.
pub fn parse_raw_message(identifier: impl Into<String>, raw: &[u8]) -> RawMessage {
    let identifier = identifier.into();
    let data = skip_from_line(raw);

    match mailparse::parse_mail(data) {
        Ok(mail) => RawMessage {
            identifier,
            headers: collect_headers(&mail.headers),
            body: convert_part(&mail, 0),
        },
        Err(e) => {
            warn!(%identifier, error = %e, "Unparseable message, keeping raw bytes as text");
            RawMessage {
                identifier,
                headers: parse_headers(data),
                body: MessageBody::Single(Payload::new("text/plain", None, data)),
            }
        }
    }
}

/// Parse only the top-level headers of a raw message.
pub fn parse_headers(raw: &[u8]) -> Vec<(String, String)> {
    match mailparse::parse_headers(skip_from_line(raw)) {
        Ok((headers, _)) => collect_headers(&headers),
        Err(e) => {
            debug!(error = %e, "Unparseable header block");
            Vec::new()
        }
    }
}

/// Headers as `(lowercase_name, unfolded_raw_value)`, in order of appearance.
///
/// Values stay RFC 2047 encoded; [`header::decode_header`] decodes them later.
fn collect_headers(headers: &[MailHeader<'_>]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|h| {
            let value = header::decode_header_bytes(h.get_value_raw());
            (
                h.get_key().trim().to_ascii_lowercase(),
                header::unfold_value(&value),
            )
        })
        .collect()
}

fn convert_part(part: &ParsedMail<'_>, depth: usize) -> MessageBody {
    if !part.subparts.is_empty() {
        if depth < MAX_DEPTH {
            return MessageBody::Multipart(
                part.subparts
                    .iter()
                    .map(|sub| convert_part(sub, depth + 1))
                    .collect(),
            );
        }
        warn!(depth, "Multipart nesting too deep, keeping part opaque");
    }

    let mut content_type = part.ctype.mimetype.trim().to_ascii_lowercase();
    if !content_type.contains('/') {
        content_type = "text/plain".to_string();
    }
    let disposition = part.headers.get_first_value("Content-Disposition");
    let data = part.get_body_raw().unwrap_or_else(|e| {
        warn!(%content_type, error = %e, "Undecodable transfer encoding, dropping payload");
        Vec::new()
    });

    let payload = Payload {
        charset: part.ctype.params.get("charset").cloned(),
        content_type,
        disposition,
        data,
    };

    // Embedded messages are walked like any other container, unless attached.
    if payload.content_type == "message/rfc822" && !payload.is_attachment() && depth < MAX_DEPTH {
        match mailparse::parse_mail(&payload.data) {
            Ok(inner) => return MessageBody::Multipart(vec![convert_part(&inner, depth + 1)]),
            Err(e) => debug!(error = %e, "Embedded message did not parse, keeping it opaque"),
        }
    }

    MessageBody::Single(payload)
}

/// Skip a UTF-8 BOM and the `From ` separator line of MBOX messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
