//! Durable storage for saved reply drafts.

pub mod drafts;

pub use drafts::DraftStore;
