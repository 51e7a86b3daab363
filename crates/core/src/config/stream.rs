// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event stream configuration and connection identity parsing

use super::ConfigError;
use crate::event::{PartitionId, MAX_EVENT_BYTES};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How a node authenticates to the stream service
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Shared-secret key
    SharedAccessKey { key_name: String, key: String },
    /// Managed-identity token, resolved by the transport
    ManagedIdentity { identity_id: String },
    /// No credential; only accepted for local (`file://`, `memory://`) endpoints
    Anonymous,
}

// Keys never reach logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SharedAccessKey { key_name, .. } => f
                .debug_struct("SharedAccessKey")
                .field("key_name", key_name)
                .field("key", &"<redacted>")
                .finish(),
            Credential::ManagedIdentity { identity_id } => f
                .debug_struct("ManagedIdentity")
                .field("identity_id", identity_id)
                .finish(),
            Credential::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Parsed connection identity: where the stream lives and how to reach it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamIdentity {
    pub endpoint: String,
    pub entity_path: String,
    pub credential: Credential,
}

impl StreamIdentity {
    /// Parse a `Key=Value;...` connection string
    ///
    /// Recognized keys: `Endpoint`, `EntityPath`, `SharedAccessKeyName`,
    /// `SharedAccessKey`, `ManagedIdentityId`. A non-empty `entity_override`
    /// replaces any `EntityPath` in the string.
    pub fn parse(connection: &str, entity_override: Option<&str>) -> Result<Self, ConfigError> {
        let mut endpoint = None;
        let mut entity_path = None;
        let mut key_name = None;
        let mut key = None;
        let mut identity_id = None;

        for part in connection.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                ConfigError::InvalidConnection(format!("segment without '=': {}", redact(part)))
            })?;
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value),
                "entitypath" => entity_path = Some(value),
                "sharedaccesskeyname" => key_name = Some(value),
                "sharedaccesskey" => key = Some(value),
                "managedidentityid" => identity_id = Some(value),
                other => {
                    return Err(ConfigError::InvalidConnection(format!(
                        "unknown key '{}'",
                        other
                    )))
                }
            }
        }

        let endpoint = endpoint
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ConfigError::InvalidConnection("missing Endpoint".to_string()))?;

        let entity_path = entity_override
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .or(entity_path)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ConfigError::InvalidConnection("missing EntityPath".to_string()))?;

        let credential = match (key_name, key, identity_id) {
            (Some(key_name), Some(key), None) => Credential::SharedAccessKey { key_name, key },
            (None, None, Some(identity_id)) => Credential::ManagedIdentity { identity_id },
            (None, None, None) if is_local_endpoint(&endpoint) => Credential::Anonymous,
            (None, None, None) => {
                return Err(ConfigError::InvalidConnection(
                    "no credential for remote endpoint".to_string(),
                ))
            }
            _ => {
                return Err(ConfigError::InvalidConnection(
                    "credential must be a complete shared key or a managed identity, not both"
                        .to_string(),
                ))
            }
        };

        Ok(Self {
            endpoint,
            entity_path,
            credential,
        })
    }

    /// Filesystem directory for `file://` endpoints
    pub fn local_path(&self) -> Option<&str> {
        self.endpoint.strip_prefix("file://")
    }
}

fn is_local_endpoint(endpoint: &str) -> bool {
    endpoint.starts_with("file://") || endpoint.starts_with("memory://")
}

fn redact(segment: &str) -> String {
    match segment.split_once('=') {
        Some((name, _)) => format!("{}=<redacted>", name),
        None => "<redacted>".to_string(),
    }
}

/// `[stream]` table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Connection string; see [`StreamIdentity::parse`]
    pub connection: String,
    /// Overrides the connection string's `EntityPath`
    pub event_hub_name: String,
    pub consumer_group: String,
    pub partition_id: PartitionId,
    /// Bound on closing a receiver; a hang past this is reported as a failure
    #[serde(with = "humantime_serde")]
    pub receiver_close_timeout: Duration,
    /// How long one receive call waits for events before returning empty
    #[serde(with = "humantime_serde")]
    pub receive_wait: Duration,
    pub max_batch_size: usize,
    pub max_event_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            connection: String::new(),
            event_hub_name: String::new(),
            consumer_group: "$Default".to_string(),
            partition_id: PartitionId::default(),
            receiver_close_timeout: Duration::from_secs(60),
            receive_wait: Duration::from_millis(500),
            max_batch_size: 100,
            max_event_bytes: MAX_EVENT_BYTES,
        }
    }
}

impl StreamConfig {
    pub fn identity(&self) -> Result<StreamIdentity, ConfigError> {
        StreamIdentity::parse(&self.connection, Some(&self.event_hub_name))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.identity()?;
        if self.consumer_group.is_empty() {
            return Err(ConfigError::Invalid(
                "stream.consumer_group must not be empty".to_string(),
            ));
        }
        if self.partition_id.as_str().is_empty() {
            return Err(ConfigError::Invalid(
                "stream.partition_id must not be empty".to_string(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "stream.max_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
