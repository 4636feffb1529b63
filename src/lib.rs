//! `mailtriage`: turn unread mail into classified records and draft replies.
//!
//! This crate provides the ingestion pipeline (MIME parsing, header decoding,
//! body extraction), the keyword classifier, reply generation with a
//! template fallback, and the append-only draft store.

pub mod classify;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod reply;
pub mod source;
pub mod store;
pub mod worker;
