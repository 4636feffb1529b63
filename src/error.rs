//! Centralized error types for mailtriage.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that may cross the library boundary.
///
/// Decode, parse and generation problems never show up here: they are
/// recovered where they happen. Only batch-level fetch failures, draft
/// write failures and caller mistakes propagate.
#[derive(Error, Debug)]
pub enum TriageError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configured mailbox path does not exist.
    #[error("Mailbox not found: {0}")]
    SourceNotFound(PathBuf),

    /// The whole fetch cycle failed (authentication, connectivity, unreadable mailbox).
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// A draft could not be persisted.
    #[error("Could not write draft store '{path}': {reason}")]
    DraftWrite { path: PathBuf, reason: String },

    /// No message with this identifier exists in the current batch.
    #[error("No message with identifier '{0}' in the current batch")]
    UnknownMessage(String),

    /// An empty reply cannot be saved as a draft.
    #[error("Cannot save an empty reply")]
    EmptyReply,

    /// An operation of the same kind is already running.
    #[error("A {0} operation is already in progress")]
    Busy(&'static str),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, TriageError>`.
pub type Result<T> = std::result::Result<T, TriageError>;

impl TriageError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure signal from a text generation backend.
///
/// Internal to the reply generator; it is logged and absorbed into the
/// template fallback.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// No backend is configured or it failed to initialize.
    #[error("Generation backend unavailable: {0}")]
    Unavailable(String),

    /// The backend was reachable but the call failed.
    #[error("Generation request failed: {0}")]
    Request(String),

    /// The backend produced text that is not a usable reply.
    #[error("Generated reply rejected: {0}")]
    InvalidOutput(String),
}
