//! RFC 5322 header handling: unfolding and RFC 2047 encoded-word decoding.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use tracing::debug;

use super::charset::{self, Malformed};

/// Decode a possibly-absent header value into a display string.
///
/// Absent or empty input yields an empty string. Never fails.
pub fn decode_header(raw: Option<&str>) -> String {
    match raw {
        Some(value) if !value.is_empty() => decode_encoded_words(value),
        _ => String::new(),
    }
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Literal text is copied through unchanged, so input without encoded-words
/// comes back as-is. A token that looks like an encoded-word but does not
/// parse is also kept verbatim.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two adjacent encoded-words is not displayed (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];
        match try_decode_one_word(after_start) {
            Some(word) => {
                result.push_str(&word.text);
                remaining = &after_start[word.consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

struct DecodedWord {
    text: String,
    /// Bytes consumed from the string *after* the initial `=?`.
    consumed: usize,
}

/// Decode one `charset?encoding?text?=` token.
fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    let first_q = s.find('?')?;
    let charset = &s[..first_q];
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let bytes = match encoding {
        "B" | "b" => decode_b_encoding(encoded_text)?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    let text = charset::decode_with_fallback(Some(charset), &bytes, Malformed::Discard);
    Some(DecodedWord {
        text,
        consumed: first_q + 1 + second_q + 1 + end + 2,
    })
}

/// Base64 for encoded-words: padding is optional and surrounding whitespace ignored.
const ENCODED_WORD_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn decode_b_encoding(input: &str) -> Option<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    match ENCODED_WORD_BASE64.decode(compact) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            debug!(error = %e, "Invalid base64 in encoded-word");
            None
        }
    }
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => match bytes.get(i + 1..i + 3).and_then(hex_byte) {
                Some(byte) => {
                    result.push(byte);
                    i += 3;
                }
                None => {
                    result.push(b'=');
                    i += 1;
                }
            },
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Parse two ASCII hex digits.
fn hex_byte(pair: &[u8]) -> Option<u8> {
    let s = std::str::from_utf8(pair).ok()?;
    u8::from_str_radix(s, 16).ok()
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub(crate) fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold a header value: continuation lines are joined with single spaces.
pub(crate) fn unfold_value(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Get the first value for a header name (names are stored lowercase).
pub(crate) fn get_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        let input = "Re: =?UTF-8?B?SG9sYQ==?= there";
        assert_eq!(decode_encoded_words(input), "Re: Hola there");
    }

    #[test]
    fn test_literal_text_is_identity() {
        for input in ["Normal subject", "Price =? maybe", "a ?= b =?x", "  padded  "] {
            assert_eq!(decode_encoded_words(input), input);
        }
    }

    #[test]
    fn test_unknown_charset_discards_invalid_bytes() {
        // 0xFF is not UTF-8 and the charset label is unknown
        assert_eq!(decode_encoded_words("=?x-bogus?Q?ok=FF?="), "ok");
    }

    #[test]
    fn test_decode_header_absent_or_empty() {
        assert_eq!(decode_header(None), "");
        assert_eq!(decode_header(Some("")), "");
    }

    #[test]
    fn test_decode_utf8_base64_japanese() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?5bGx55Sw5aSq6YOO?="), "山田太郎");
    }

    #[test]
    fn test_decode_windows1252_encoded_word() {
        assert_eq!(decode_encoded_words("=?Windows-1252?Q?M=FCller?="), "Müller");
    }

    #[test]
    fn test_unfold_value() {
        assert_eq!(
            unfold_value(" This is a long\r\n\tsubject line"),
            "This is a long subject line"
        );
        assert_eq!(unfold_value("plain"), "plain");
    }

    #[test]
    fn test_known_charset_discards_malformed_bytes() {
        // b2v/ is "ok" followed by 0xFF, which is not valid UTF-8
        assert_eq!(decode_encoded_words("=?utf-8?B?b2v/?="), "ok");
        assert_eq!(decode_encoded_words("=?UTF-8?Q?caf=C3=A9=FF?="), "café");
    }

    #[test]
    fn test_b_encoding_without_padding() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYQ?="), "Hola");
    }

    #[test]
    fn test_invalid_base64_word_kept_verbatim() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?***?="), "=?UTF-8?B?***?=");
    }
}
