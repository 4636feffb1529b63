//! Core data model: raw and normalized messages, senders, and drafts.

pub mod address;
pub mod draft;
pub mod mail;
