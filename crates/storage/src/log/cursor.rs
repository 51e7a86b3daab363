// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tailing reader over a partition file
//!
//! A cursor remembers the byte offset it has consumed, so each poll only
//! reads lines appended since the last one. A line without its trailing
//! newline is still being written and is left for a later poll.

use super::entry::LogEntry;
use crate::StorageError;
use lrep_core::StreamPosition;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub struct LogCursor {
    path: PathBuf,
    offset: u64,
    line: u64,
    /// Next position to deliver; earlier entries are skipped
    from: StreamPosition,
}

impl LogCursor {
    /// Position a cursor at `from`; the file need not exist yet
    pub fn open(path: &Path, from: StreamPosition) -> Self {
        Self {
            path: path.to_path_buf(),
            offset: 0,
            line: 0,
            from,
        }
    }

    /// Read up to `max` new entries
    ///
    /// Returns an empty batch when nothing new has been appended.
    pub fn poll(&mut self, max: usize) -> Result<Vec<LogEntry>, StorageError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(self.offset))?;

        let mut entries = Vec::new();
        let mut buf = Vec::new();
        while entries.len() < max {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)?;
            if read == 0 || buf.last() != Some(&b'\n') {
                break;
            }

            let line_number = self.line + 1;
            let text = std::str::from_utf8(&buf[..read - 1]).map_err(|e| {
                StorageError::Corrupted {
                    line: line_number,
                    reason: e.to_string(),
                }
            })?;
            let entry = LogEntry::from_line(text).map_err(|e| StorageError::Corrupted {
                line: line_number,
                reason: e.to_string(),
            })?;
            if !entry.verify() {
                return Err(StorageError::ChecksumMismatch { line: line_number });
            }

            self.offset += read as u64;
            self.line = line_number;
            if entry.position() >= self.from {
                self.from = entry.position().next();
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    /// Position of the next entry this cursor can deliver
    pub fn position(&self) -> StreamPosition {
        self.from
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
