//! Append-only JSON draft store.
//!
//! The file holds one JSON array. Each append reads it fully, pushes one
//! record and rewrites it through a temporary file. Drafts are low-volume, so
//! whole-file rewrites are fine.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, TriageError};
use crate::model::draft::DraftRecord;

/// Durable, ordered collection of saved drafts.
#[derive(Debug, Clone)]
pub struct DraftStore {
    path: PathBuf,
}

impl DraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one draft, keeping every existing entry.
    ///
    /// Unreadable or corrupt existing content is treated as empty. Only a
    /// failure to write the new file is reported.
    pub fn append(&self, draft: &DraftRecord) -> Result<()> {
        let mut entries = self.read_entries();
        let record = serde_json::to_value(draft).map_err(|e| self.write_error(e))?;
        entries.push(record);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
        }

        let contents = serde_json::to_string_pretty(&entries).map_err(|e| self.write_error(e))?;
        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, contents).map_err(|e| self.write_error(e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| self.write_error(e))?;

        info!(path = %self.path.display(), count = entries.len(), "Draft saved");
        Ok(())
    }

    /// All drafts that parse as [`DraftRecord`], oldest first.
    ///
    /// Entries with an unexpected shape are skipped (but kept on disk).
    pub fn load(&self) -> Vec<DraftRecord> {
        self.read_entries()
            .into_iter()
            .enumerate()
            .filter_map(|(idx, value)| match serde_json::from_value(value) {
                Ok(draft) => Some(draft),
                Err(e) => {
                    warn!(index = idx, error = %e, "Skipping unreadable draft entry");
                    None
                }
            })
            .collect()
    }

    /// Raw entries of the existing file; empty when missing or corrupt.
    fn read_entries(&self) -> Vec<Value> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No draft store yet");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot read draft store, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Value>>(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt draft store, starting empty");
                Vec::new()
            }
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_error(&self, reason: impl std::fmt::Display) -> TriageError {
        TriageError::DraftWrite {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mail::NormalizedEmail;

    fn draft(reply: &str) -> DraftRecord {
        let email = NormalizedEmail::new("1", "a@b.c", "a@b.c", "Subj", "Body", "");
        DraftRecord::from_email(&email, reply)
    }

    #[test]
    fn test_append_creates_file_and_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DraftStore::new(dir.path().join("nested").join("drafts.json"));
        store.append(&draft("one")).expect("append");
        assert_eq!(store.load().len(), 1);
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn test_corrupt_store_is_replaced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("drafts.json");
        std::fs::write(&path, "{not json").expect("write");
        let store = DraftStore::new(&path);
        assert!(store.load().is_empty());
        store.append(&draft("fresh")).expect("append");
        let drafts = store.load();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].reply_text, "fresh");
    }

    #[test]
    fn test_unknown_entries_preserved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("drafts.json");
        std::fs::write(&path, r#"[{"legacy": true}]"#).expect("write");
        let store = DraftStore::new(&path);
        store.append(&draft("new")).expect("append");

        let raw: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0]["legacy"], true);
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        // The store path is an existing directory: the rename cannot succeed
        let store = DraftStore::new(dir.path());
        assert!(matches!(
            store.append(&draft("x")),
            Err(TriageError::DraftWrite { .. })
        ));
    }
}
