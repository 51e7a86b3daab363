// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partition log entry with checksum verification
//!
//! Each entry holds the partition sequence number, the enqueue time, the event
//! and a CRC32 of the serialized event.

use crate::StorageError;
use chrono::{DateTime, Utc};
use lrep_core::{Event, ReceivedEvent, StreamPosition};
use serde::{Deserialize, Serialize};

/// A single entry in a partition log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonically increasing sequence number within the partition
    pub sequence: u64,
    pub enqueued_at: DateTime<Utc>,
    pub event: Event,
    /// CRC32 checksum of the serialized event
    pub checksum: u32,
}

impl LogEntry {
    pub fn new(sequence: u64, enqueued_at: DateTime<Utc>, event: Event) -> Self {
        let checksum = Self::calculate_checksum(&event);
        Self {
            sequence,
            enqueued_at,
            event,
            checksum,
        }
    }

    fn calculate_checksum(event: &Event) -> u32 {
        // Event holds only strings, bytes and maps; serialization cannot fail
        let json = serde_json::to_vec(event).unwrap_or_default();
        crc32fast::hash(&json)
    }

    pub fn verify(&self) -> bool {
        self.checksum == Self::calculate_checksum(&self.event)
    }

    pub fn position(&self) -> StreamPosition {
        StreamPosition::from_sequence(self.sequence)
    }

    /// Serialize to newline-delimited JSON (one line, no newline)
    pub fn to_line(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(StorageError::from)
    }

    pub fn from_line(line: &str) -> Result<Self, StorageError> {
        serde_json::from_str(line).map_err(StorageError::from)
    }

    pub fn into_received(self) -> ReceivedEvent {
        ReceivedEvent {
            position: self.position(),
            enqueued_at: self.enqueued_at,
            event: self.event,
        }
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
