// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replication configuration loaded from TOML
//!
//! ```toml
//! node_name = "cache-01"
//!
//! [stream]
//! connection = "Endpoint=sb://ns.example.net/;SharedAccessKeyName=k;SharedAccessKey=..."
//! event_hub_name = "locations"
//!
//! [registry]
//! kind = "blob"
//! store_root = "/var/lib/lrep/blobs"
//! container = "checkpoints"
//!
//! [retry]
//! minimum_window = "1ms"
//! maximum_window = "5s"
//! ```

mod registry;
mod stream;

pub use registry::{is_valid_container_name, BlobRegistryConfig, RegistryConfig};
pub use stream::{Credential, StreamConfig, StreamIdentity};

use crate::error::{Classify, ErrorClass};
use crate::retry::{RetryPolicy, RetryPolicyError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration problems; always fatal
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid stream connection: {0}")]
    InvalidConnection(String),
    #[error("invalid retry policy: {0}")]
    Retry(#[from] RetryPolicyError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Classify for ConfigError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Fatal
    }
}

/// Top-level replication settings for one node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Name recorded as the producer of checkpoints this node registers
    pub node_name: String,
    pub stream: StreamConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl ReplicationConfig {
    /// Parse and validate TOML content
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ReplicationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_name.trim().is_empty() {
            return Err(ConfigError::Invalid("node_name must not be empty".to_string()));
        }
        self.stream.validate()?;
        self.registry.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
