//! Saved reply drafts.

use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};

use super::mail::{category_or_unclassified, Category, NormalizedEmail};

/// One saved reply, appended to the draft store and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRecord {
    #[serde(rename = "from", default)]
    pub sender_display: String,
    #[serde(default)]
    pub subject: String,
    #[serde(rename = "body", default)]
    pub body_text: String,
    #[serde(rename = "reply")]
    pub reply_text: String,
    #[serde(default, deserialize_with = "category_or_unclassified")]
    pub category: Category,
    /// ISO-8601 local timestamp.
    pub saved_at: String,
}

impl DraftRecord {
    /// Build a draft for `email`, stamped with the current local time.
    pub fn from_email(email: &NormalizedEmail, reply_text: impl Into<String>) -> Self {
        Self::at(email, reply_text, Local::now())
    }

    /// Build a draft with an explicit save time.
    pub fn at(
        email: &NormalizedEmail,
        reply_text: impl Into<String>,
        saved_at: DateTime<Local>,
    ) -> Self {
        Self {
            sender_display: email.sender_display.clone(),
            subject: email.subject.clone(),
            body_text: email.body_text.clone(),
            reply_text: reply_text.into(),
            category: email.category(),
            saved_at: saved_at.to_rfc3339_opts(SecondsFormat::Micros, false),
        }
    }
}
