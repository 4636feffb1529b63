//! The ingestion pipeline and the session that owns one fetch batch.
//!
//! raw message → header decode + body extraction → [`NormalizedEmail`] →
//! classification → (on request) draft.

use tracing::{debug, info, warn};

use crate::error::{Result, TriageError};
use crate::model::address::Sender;
use crate::model::draft::DraftRecord;
use crate::model::mail::{Category, NormalizedEmail, RawMessage};
use crate::parser::body::{extract_body, DEFAULT_BODY_CAP};
use crate::parser::header::decode_header;
use crate::source::MessageSource;

/// Turn a raw message into an unclassified record. Never fails.
pub fn normalize(raw: &RawMessage, body_cap: usize) -> NormalizedEmail {
    let sender_display = decode_header(raw.header("from"));
    let sender = Sender::parse(&sender_display);
    let sender_name = match sender.greeting_name() {
        "" => sender_display.clone(),
        name => name.to_string(),
    };

    NormalizedEmail::new(
        raw.identifier.clone(),
        sender_display,
        sender_name,
        decode_header(raw.header("subject")),
        extract_body(raw, body_cap),
        raw.header("date").unwrap_or("").to_string(),
    )
}

/// In-memory state of one triage session: the current batch.
#[derive(Debug)]
pub struct Session {
    batch: Vec<NormalizedEmail>,
    body_cap: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_BODY_CAP)
    }
}

impl Session {
    pub fn new(body_cap: usize) -> Self {
        Self {
            batch: Vec::new(),
            body_cap,
        }
    }

    /// Run one fetch cycle and replace the batch with its result.
    ///
    /// A failed fetch leaves the previous batch untouched and returns the error.
    pub fn fetch(&mut self, source: &mut dyn MessageSource, limit: usize) -> Result<usize> {
        let raws = source.fetch_unread(limit)?;
        let batch = normalize_batch(&raws, self.body_cap);
        Ok(self.replace_batch(batch))
    }

    /// Replace the whole batch. Returns the new batch size.
    pub fn replace_batch(&mut self, batch: Vec<NormalizedEmail>) -> usize {
        let mut seen = std::collections::HashSet::new();
        for email in &batch {
            if !seen.insert(email.identifier.as_str()) {
                warn!(identifier = %email.identifier, "Duplicate identifier in batch");
            }
        }
        info!(previous = self.batch.len(), count = batch.len(), "Batch replaced");
        self.batch = batch;
        self.batch.len()
    }

    /// Classify every record in place.
    pub fn classify_all(&mut self) {
        for email in &mut self.batch {
            let category = email.classify();
            debug!(identifier = %email.identifier, %category, "Classified");
        }
    }

    pub fn emails(&self) -> &[NormalizedEmail] {
        &self.batch
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Look up a record by identifier.
    pub fn get(&self, identifier: &str) -> Result<&NormalizedEmail> {
        self.batch
            .iter()
            .find(|e| e.identifier == identifier)
            .ok_or_else(|| TriageError::UnknownMessage(identifier.to_string()))
    }

    /// Re-run the classifier on one record and return its category.
    pub fn reclassify(&mut self, identifier: &str) -> Result<Category> {
        self.batch
            .iter_mut()
            .find(|e| e.identifier == identifier)
            .map(NormalizedEmail::classify)
            .ok_or_else(|| TriageError::UnknownMessage(identifier.to_string()))
    }

    /// Build a draft for a record in the batch.
    pub fn draft_for(&self, identifier: &str, reply_text: &str) -> Result<DraftRecord> {
        if reply_text.trim().is_empty() {
            return Err(TriageError::EmptyReply);
        }
        let email = self.get(identifier)?;
        Ok(DraftRecord::from_email(email, reply_text))
    }
}

/// Normalize raw messages in the order given.
pub fn normalize_batch(raws: &[RawMessage], body_cap: usize) -> Vec<NormalizedEmail> {
    raws.iter()
        .map(|raw| {
            let email = normalize(raw, body_cap);
            debug!(
                identifier = %email.identifier,
                subject = %email.subject,
                body_len = email.body_text.len(),
                "Normalized message"
            );
            email
        })
        .collect()
}
