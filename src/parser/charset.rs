//! Best-effort charset decoding.
//!
//! Decoding is a two-step chain: the declared charset first, then UTF-8 with
//! a policy for invalid bytes. Neither step can fail, so callers always get text.

use tracing::debug;

/// What to do with bytes that are not valid UTF-8 in the fallback step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    /// Substitute U+FFFD for each invalid sequence (body text).
    Replace,
    /// Drop invalid sequences (header text).
    Discard,
}

/// Decode `bytes` with the declared charset label, falling back to UTF-8.
///
/// A missing label is treated as UTF-8.
pub fn decode_with_fallback(label: Option<&str>, bytes: &[u8], malformed: Malformed) -> String {
    match decode_declared(label.unwrap_or("utf-8"), bytes) {
        Some(text) => text,
        None => {
            debug!(charset = ?label, "Declared charset failed, decoding as UTF-8");
            decode_utf8(bytes, malformed)
        }
    }
}

/// Strict decode with the declared charset.
///
/// Returns `None` for unknown labels or for input that is malformed in that charset.
pub fn decode_declared(label: &str, bytes: &[u8]) -> Option<String> {
    // RFC 2231 language suffix: "utf-8*en"
    let label = label.split('*').next().unwrap_or("").trim();
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())?;
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|cow| cow.into_owned())
}

/// Decode UTF-8, handling invalid sequences according to `malformed`.
pub fn decode_utf8(bytes: &[u8], malformed: Malformed) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
        if malformed == Malformed::Replace && !chunk.invalid().is_empty() {
            out.push(char::REPLACEMENT_CHARACTER);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_latin1() {
        let text = decode_with_fallback(Some("ISO-8859-1"), b"caf\xE9", Malformed::Replace);
        assert_eq!(text, "café");
    }

    #[test]
    fn test_unknown_charset_falls_back_to_utf8() {
        let text = decode_with_fallback(Some("x-made-up"), "señor".as_bytes(), Malformed::Replace);
        assert_eq!(text, "señor");
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let text = decode_with_fallback(Some("utf-8"), b"ok\xFF!", Malformed::Replace);
        assert_eq!(text, "ok\u{FFFD}!");
    }

    #[test]
    fn test_invalid_utf8_discarded() {
        let text = decode_with_fallback(None, b"ok\xFF\xFE!", Malformed::Discard);
        assert_eq!(text, "ok!");
    }

    #[test]
    fn test_language_suffix_ignored() {
        assert_eq!(decode_declared("utf-8*en", b"hi").as_deref(), Some("hi"));
    }
}
