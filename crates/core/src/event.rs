// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream events: opaque payloads bound for a partition

use crate::position::StreamPosition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Largest event (payload plus properties) a transport accepts by default
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// Identifier of a stream partition
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionId(pub String);

impl PartitionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PartitionId {
    /// The single partition every stream in this system uses
    fn default() -> Self {
        Self("0".to_string())
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event to append to a stream
///
/// The payload is never interpreted here; the replication layer owns the codec.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub partition: PartitionId,
    pub payload: Vec<u8>,
    /// Envelope properties (sender identity, epoch, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Event {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            partition: PartitionId::default(),
            payload: payload.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_partition(mut self, partition: PartitionId) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Bytes counted against the transport message-size limit
    pub fn size_bytes(&self) -> usize {
        self.payload.len()
            + self
                .properties
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }
}

/// An event as delivered by a receiver
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedEvent {
    /// Where this event sits in its partition
    pub position: StreamPosition,
    /// When the stream service accepted the event
    pub enqueued_at: DateTime<Utc>,
    pub event: Event,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
