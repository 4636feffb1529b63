//! Unread messages from a Maildir.
//!
//! Messages the MUA has not seen yet live in `new/`. Their file name is the
//! identifier.

use std::path::PathBuf;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::error::{Result, TriageError};
use crate::model::mail::RawMessage;
use crate::parser::mime::parse_raw_message;
use crate::source::MessageSource;

pub struct MaildirSource {
    root: PathBuf,
}

impl MaildirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Files in `new/` with their modification times.
    fn list_new(&self) -> Result<Vec<(SystemTime, PathBuf)>> {
        let new_dir = self.root.join("new");
        let entries = std::fs::read_dir(&new_dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TriageError::SourceNotFound(new_dir.clone())
            } else {
                TriageError::Fetch(format!("cannot list {}: {e}", new_dir.display()))
            }
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TriageError::Fetch(e.to_string()))?;
            let path = entry.path();
            let metadata = entry
                .metadata()
                .map_err(|e| TriageError::Fetch(format!("{}: {e}", path.display())))?;
            if !metadata.is_file() {
                continue;
            }
            // Dot files are temporaries of other delivery agents.
            if entry.file_name().to_string_lossy().starts_with('.') {
                debug!(path = %path.display(), "Skipping hidden file");
                continue;
            }
            let modified = metadata.modified().unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "No modification time");
                SystemTime::UNIX_EPOCH
            });
            files.push((modified, path));
        }
        Ok(files)
    }
}

impl MessageSource for MaildirSource {
    fn fetch_unread(&mut self, limit: usize) -> Result<Vec<RawMessage>> {
        let mut files = self.list_new()?;
        let unread = files.len();
        // Newest first; file name breaks ties so the order is stable.
        files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        files.truncate(limit);

        let mut messages = Vec::with_capacity(files.len());
        for (_, path) in files {
            let raw = std::fs::read(&path)
                .map_err(|e| TriageError::Fetch(format!("{}: {e}", path.display())))?;
            let identifier = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!(identifier = %identifier, bytes = raw.len(), "Parsing unread message");
            messages.push(parse_raw_message(identifier, &raw));
        }

        info!(
            root = %self.root.display(),
            unread,
            returned = messages.len(),
            "Scanned Maildir"
        );
        Ok(messages)
    }

    fn describe(&self) -> String {
        format!("maildir:{}", self.root.display())
    }
}
