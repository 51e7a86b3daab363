// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partition log writer for durable appends
//!
//! Several writers (in one process or many) may share a partition file. Each
//! append holds an exclusive advisory lock, rescans if another writer moved
//! the tail, and fsyncs before returning the assigned sequence number.

use super::entry::LogEntry;
use crate::StorageError;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use lrep_core::Event;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Durable appender for one partition file
pub struct LogWriter {
    path: PathBuf,
    file: File,
    next_sequence: u64,
    /// File length after our last write or scan
    known_len: u64,
}

/// Result of scanning a partition file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Scan {
    pub next_sequence: u64,
    /// Length of the prefix made of complete, verified entries
    pub valid_len: u64,
}

impl LogWriter {
    /// Open or create a partition file
    ///
    /// A torn or corrupt tail left by a crashed writer is truncated away.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        file.lock_exclusive()?;
        let repaired = Self::repair(path, &file);
        let unlocked = FileExt::unlock(&file);
        let scan = repaired?;
        unlocked?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_sequence: scan.next_sequence,
            known_len: scan.valid_len,
        })
    }

    fn repair(path: &Path, file: &File) -> Result<Scan, StorageError> {
        let scan = scan(path)?;
        if file.metadata()?.len() > scan.valid_len {
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }
        Ok(scan)
    }

    /// Append an event to the partition
    ///
    /// Returns the assigned sequence number once the entry is on disk.
    pub fn append(
        &mut self,
        enqueued_at: DateTime<Utc>,
        event: Event,
    ) -> Result<u64, StorageError> {
        self.file.lock_exclusive()?;
        let appended = self.append_locked(enqueued_at, event);
        let unlocked = FileExt::unlock(&self.file);
        let sequence = appended?;
        unlocked?;
        Ok(sequence)
    }

    fn append_locked(
        &mut self,
        enqueued_at: DateTime<Utc>,
        event: Event,
    ) -> Result<u64, StorageError> {
        if self.file.metadata()?.len() != self.known_len {
            let scan = Self::repair(&self.path, &self.file)?;
            self.next_sequence = scan.next_sequence;
            self.known_len = scan.valid_len;
        }

        let sequence = self.next_sequence;
        let entry = LogEntry::new(sequence, enqueued_at, event);
        let mut line = entry.to_line()?;
        line.push('\n');

        // One write so readers never observe a line split across writes
        self.file.write_all(line.as_bytes())?;
        self.file.sync_data()?;

        self.next_sequence += 1;
        self.known_len += line.len() as u64;
        Ok(sequence)
    }

    /// Sequence number the next append will be assigned, as last observed
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Scan a partition file, stopping at the first torn or invalid line
pub(crate) fn scan(path: &Path) -> Result<Scan, StorageError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut next_sequence = 0;
    let mut valid_len = 0u64;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 || buf.last() != Some(&b'\n') {
            break;
        }

        let entry = match std::str::from_utf8(&buf[..read - 1])
            .ok()
            .and_then(|line| LogEntry::from_line(line).ok())
        {
            Some(entry) if entry.verify() => entry,
            _ => break,
        };

        next_sequence = entry.sequence + 1;
        valid_len += read as u64;
    }

    Ok(Scan {
        next_sequence,
        valid_len,
    })
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
