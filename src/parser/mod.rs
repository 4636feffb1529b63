//! Message parsing: MIME structure, header decoding, charsets and body extraction.

pub mod body;
pub mod charset;
pub mod header;
pub mod mime;
