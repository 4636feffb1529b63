//! Unread messages from an MBOX file.
//!
//! The file is streamed line by line and never loaded whole. Only the raw
//! bytes of the newest `limit` unread messages are kept while scanning.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::{Result, TriageError};
use crate::model::mail::RawMessage;
use crate::parser::header::get_header;
use crate::parser::mime::{parse_headers, parse_raw_message};
use crate::source::MessageSource;

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 128 * 1024;

/// Messages larger than this are truncated while scanning.
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// MBOX mailbox. Message identifiers are zero-based positions in the file.
///
/// Tolerant of mixed `\n`/`\r\n` line endings, a UTF-8 BOM, and `From `
/// lines not preceded by a blank line.
pub struct MboxSource {
    path: PathBuf,
}

impl MboxSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Stream every message, calling `on_message(sequence, raw_bytes)`.
    ///
    /// Returns the number of messages seen.
    fn scan(&self, on_message: &mut dyn FnMut(u64, &[u8])) -> Result<u64> {
        let file = File::open(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TriageError::SourceNotFound(self.path.clone())
            } else {
                TriageError::io(&self.path, e)
            }
        })?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut count: u64 = 0;
        let mut offset: u64 = 0;
        let mut message_buf: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);
        let mut prev_line_was_empty = true;
        let mut first_line = true;
        let mut oversized = false;

        loop {
            line_buf.clear();
            let line_len = reader
                .read_until(b'\n', &mut line_buf)
                .map_err(|e| TriageError::io(&self.path, e))?;
            if line_len == 0 {
                break;
            }

            if is_mbox_separator(&line_buf) {
                if !first_line && !prev_line_was_empty {
                    warn!(offset, "Found 'From ' separator without preceding blank line");
                }
                if !message_buf.is_empty() {
                    on_message(count, &message_buf);
                    count += 1;
                }
                message_buf.clear();
                oversized = false;
                message_buf.extend_from_slice(&line_buf);
            } else if message_buf.len() + line_buf.len() <= MAX_MESSAGE_SIZE {
                message_buf.extend_from_slice(&line_buf);
            } else if !oversized {
                warn!(sequence = count, max_size = MAX_MESSAGE_SIZE, "Message too large, truncating");
                oversized = true;
            }

            prev_line_was_empty = is_blank_line(&line_buf);
            first_line = false;
            offset += line_len as u64;
        }

        if !message_buf.is_empty() {
            on_message(count, &message_buf);
            count += 1;
        }
        Ok(count)
    }
}

impl MessageSource for MboxSource {
    fn fetch_unread(&mut self, limit: usize) -> Result<Vec<RawMessage>> {
        let mut newest: VecDeque<(u64, Vec<u8>)> = VecDeque::with_capacity(limit);
        let mut unread_total: usize = 0;

        let total = self
            .scan(&mut |sequence, raw| {
                if !is_unread(&parse_headers(raw)) {
                    return;
                }
                unread_total += 1;
                if limit == 0 {
                    return;
                }
                if newest.len() == limit {
                    newest.pop_front();
                }
                newest.push_back((sequence, raw.to_vec()));
            })
            .map_err(|e| match e {
                missing @ TriageError::SourceNotFound(_) => missing,
                other => TriageError::Fetch(other.to_string()),
            })?;

        info!(
            path = %self.path.display(),
            total,
            unread = unread_total,
            returned = newest.len(),
            "Scanned MBOX"
        );

        Ok(newest
            .into_iter()
            .rev()
            .map(|(sequence, raw)| {
                debug!(sequence, bytes = raw.len(), "Parsing unread message");
                parse_raw_message(sequence.to_string(), &raw)
            })
            .collect())
    }

    fn describe(&self) -> String {
        format!("mbox:{}", self.path.display())
    }
}

/// A message is unread unless its `Status` header carries the `R` flag.
fn is_unread(headers: &[(String, String)]) -> bool {
    !get_header(headers, "status").is_some_and(|status| status.contains('R'))
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
