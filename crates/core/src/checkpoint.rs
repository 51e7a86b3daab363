// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint state and its persisted record form

use crate::position::StreamPosition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Schema version written into every registry record
pub const RECORD_SCHEMA_VERSION: u32 = 0;

/// Identifier of a checkpoint snapshot
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointId(pub String);

impl CheckpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// "State as of this point is snapshotted; resume replication at `stream_position`."
///
/// Never mutated after creation. A newer checkpoint replaces it in the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub checkpoint_id: CheckpointId,
    pub stream_position: StreamPosition,
    pub created_at: DateTime<Utc>,
    /// Node that registered the checkpoint, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
}

impl CheckpointState {
    pub fn new(
        checkpoint_id: CheckpointId,
        stream_position: StreamPosition,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            checkpoint_id,
            stream_position,
            created_at,
            producer: None,
        }
    }

    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }
}

impl fmt::Display for CheckpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "checkpoint {} at {} (created {})",
            self.checkpoint_id,
            self.stream_position,
            self.created_at.to_rfc3339()
        )
    }
}

/// Errors decoding a registry record
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed registry record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported registry record version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Content stored in the registry blob
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub version: u32,
    pub state: CheckpointState,
}

impl RegistryRecord {
    pub fn new(state: CheckpointState) -> Self {
        Self {
            version: RECORD_SCHEMA_VERSION,
            state,
        }
    }

    /// Check the schema version; records from a newer writer are refused
    pub fn validate(self) -> Result<Self, RecordError> {
        if self.version != RECORD_SCHEMA_VERSION {
            return Err(RecordError::UnsupportedVersion {
                found: self.version,
                expected: RECORD_SCHEMA_VERSION,
            });
        }
        Ok(self)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        serde_json::from_slice::<RegistryRecord>(bytes)?.validate()
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
