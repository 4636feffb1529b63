//! Mailbox access: where unread messages come from.

pub mod maildir;
pub mod mbox;

use std::path::PathBuf;

use crate::config::{SourceConfig, SourceKind};
use crate::error::{Result, TriageError};
use crate::model::mail::RawMessage;

pub use maildir::MaildirSource;
pub use mbox::MboxSource;

/// A mailbox that can hand out its unread messages.
pub trait MessageSource: Send {
    /// Up to `limit` unread messages, most recent first.
    ///
    /// Any failure fails the whole batch.
    fn fetch_unread(&mut self, limit: usize) -> Result<Vec<RawMessage>>;

    /// Short description for logs and status lines.
    fn describe(&self) -> String;
}

/// Open the source described by `config`, with `path_override` taking
/// precedence over the configured path.
pub fn open_source(
    config: &SourceConfig,
    path_override: Option<PathBuf>,
) -> Result<Box<dyn MessageSource>> {
    let path = path_override
        .or_else(|| config.path.clone())
        .ok_or_else(|| TriageError::Config("no mailbox path configured".to_string()))?;

    Ok(match config.kind {
        SourceKind::Mbox => Box::new(MboxSource::new(path)),
        SourceKind::Maildir => Box::new(MaildirSource::new(path)),
    })
}
