// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream positions: the resume token shared by stream clients and registries

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SEQUENCE_PREFIX: &str = "seq:";

/// Position within a single event-stream partition
///
/// A position names the next event a receiver will be handed, so resuming at
/// a position delivers the event stored there and everything after it.
/// Callers should treat the value as opaque and round-trip it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamPosition(u64);

impl StreamPosition {
    /// Beginning of the partition
    pub const START: StreamPosition = StreamPosition(0);

    pub fn from_sequence(sequence: u64) -> Self {
        Self(sequence)
    }

    pub fn sequence(&self) -> u64 {
        self.0
    }

    /// Position immediately after the event at this position
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", SEQUENCE_PREFIX, self.0)
    }
}

/// Error parsing the compact string form of a position
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid stream position '{input}': expected 'seq:<n>'")]
pub struct ParsePositionError {
    input: String,
}

impl FromStr for StreamPosition {
    type Err = ParsePositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(SEQUENCE_PREFIX)
            .and_then(|n| n.parse::<u64>().ok())
            .map(StreamPosition)
            .ok_or_else(|| ParsePositionError {
                input: s.to_string(),
            })
    }
}

impl Serialize for StreamPosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StreamPosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "position_tests.rs"]
mod tests;
