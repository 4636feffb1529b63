//! Raw and normalized message types.

use serde::{Deserialize, Deserializer, Serialize};

use crate::classify;

/// A retrieved message before normalization.
///
/// Produced by a [`MessageSource`](crate::source::MessageSource) and
/// consumed once by [`pipeline::normalize`](crate::pipeline::normalize).
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Handle correlating back to the mailbox (unique within one fetch batch).
    pub identifier: String,
    /// Unfolded headers as `(lowercase_name, raw_value)`, in order of appearance.
    pub headers: Vec<(String, String)>,
    /// Body part tree.
    pub body: MessageBody,
}

impl RawMessage {
    /// First value of a header (name is matched case-insensitively).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A message body: one payload, or an ordered list of sub-bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Single(Payload),
    Multipart(Vec<MessageBody>),
}

/// A leaf body part with its transfer encoding already removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Lowercase `type/subtype`, e.g. `text/plain`.
    pub content_type: String,
    /// Declared `charset` parameter, if any.
    pub charset: Option<String>,
    /// Raw `Content-Disposition` value, if any.
    pub disposition: Option<String>,
    /// Payload bytes in the declared charset.
    pub data: Vec<u8>,
}

impl Payload {
    /// Convenience constructor for a non-attachment part.
    pub fn new(content_type: &str, charset: Option<&str>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.to_ascii_lowercase(),
            charset: charset.map(String::from),
            disposition: None,
            data: data.into(),
        }
    }

    /// Mark this part with a `Content-Disposition` value.
    pub fn with_disposition(mut self, disposition: &str) -> Self {
        self.disposition = Some(disposition.to_string());
        self
    }

    /// Whether the disposition marks this part as a file attachment.
    pub fn is_attachment(&self) -> bool {
        self.disposition
            .as_deref()
            .is_some_and(|d| d.to_ascii_lowercase().contains("attachment"))
    }
}

/// Priority bucket assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    Urgent,
    #[serde(rename = "Needs Reply")]
    NeedsReply,
    Informational,
    #[default]
    Unclassified,
}

impl Category {
    /// Human-readable label (also the serialized form).
    pub fn label(self) -> &'static str {
        match self {
            Self::Urgent => "Urgent",
            Self::NeedsReply => "Needs Reply",
            Self::Informational => "Informational",
            Self::Unclassified => "Unclassified",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Deserialize a category, mapping `null` or a missing field to `Unclassified`.
pub(crate) fn category_or_unclassified<'de, D>(deserializer: D) -> Result<Category, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Category>::deserialize(deserializer)?.unwrap_or_default())
}

/// Canonical in-memory record for one fetched message.
///
/// Lives only for one fetch cycle; the batch is replaced wholesale by the next fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEmail {
    /// Handle correlating back to the source message.
    pub identifier: String,
    /// Decoded `From` header.
    pub sender_display: String,
    /// Display name from `From`, or the bare address.
    pub sender_name: String,
    /// Decoded subject, empty if absent.
    pub subject: String,
    /// Extracted plain text, capped (see [`parser::body`](crate::parser::body)).
    pub body_text: String,
    /// `Date` header, verbatim.
    pub received_at: String,
    category: Category,
}

impl NormalizedEmail {
    /// Create an unclassified record.
    pub fn new(
        identifier: impl Into<String>,
        sender_display: impl Into<String>,
        sender_name: impl Into<String>,
        subject: impl Into<String>,
        body_text: impl Into<String>,
        received_at: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            sender_display: sender_display.into(),
            sender_name: sender_name.into(),
            subject: subject.into(),
            body_text: body_text.into(),
            received_at: received_at.into(),
            category: Category::Unclassified,
        }
    }

    /// Current category (`Unclassified` until [`classify`](Self::classify) runs).
    pub fn category(&self) -> Category {
        self.category
    }

    /// Run the classifier over subject and body and store the result.
    ///
    /// Idempotent: re-running on an unchanged record yields the same category.
    pub fn classify(&mut self) -> Category {
        self.category = classify::classify(&self.subject, &self.body_text);
        self.category
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_unclassified() {
        let email = NormalizedEmail::new("1", "a@b.com", "a@b.com", "Hi", "Body", "");
        assert_eq!(email.category(), Category::Unclassified);
    }

    #[test]
    fn test_classify_is_idempotent() {
        let mut email = NormalizedEmail::new("1", "", "", "Quick question", "", "");
        let first = email.classify();
        let second = email.classify();
        assert_eq!(first, Category::NeedsReply);
        assert_eq!(first, second);
    }

    #[test]
    fn test_attachment_disposition() {
        let part = Payload::new("text/plain", None, "x").with_disposition("Attachment; filename=a.txt");
        assert!(part.is_attachment());
        assert!(!Payload::new("text/plain", None, "x")
            .with_disposition("inline")
            .is_attachment());
    }

    #[test]
    fn test_category_serialized_labels() {
        let json = serde_json::to_string(&Category::NeedsReply).expect("serialize");
        assert_eq!(json, "\"Needs Reply\"");
        let parsed: Category = serde_json::from_str("\"Urgent\"").expect("deserialize");
        assert_eq!(parsed, Category::Urgent);
    }
}
