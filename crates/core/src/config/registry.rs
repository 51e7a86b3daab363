// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint registry configuration

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where a blob-backed registry keeps its record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobRegistryConfig {
    /// Root directory of the local blob store
    pub store_root: PathBuf,
    pub container: String,
    pub folder: String,
    pub file_name: String,
    /// Lease length used when the store cannot do conditional writes
    #[serde(with = "humantime_serde")]
    pub lease_duration: Duration,
}

impl Default for BlobRegistryConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("blobs"),
            container: "checkpoints".to_string(),
            folder: "default".to_string(),
            file_name: "checkpoints.json".to_string(),
            lease_duration: Duration::from_secs(60),
        }
    }
}

impl BlobRegistryConfig {
    /// Blob name of the registry record inside the container
    pub fn blob_name(&self) -> String {
        if self.folder.is_empty() {
            self.file_name.clone()
        } else {
            format!("{}/{}", self.folder.trim_end_matches('/'), self.file_name)
        }
    }

    fn validate(&self, table: &str) -> Result<(), ConfigError> {
        if !is_valid_container_name(&self.container) {
            return Err(ConfigError::Invalid(format!(
                "{}.container '{}' must be 3-63 lowercase letters, digits or '-'",
                table, self.container
            )));
        }
        if self.file_name.is_empty() || self.file_name.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "{}.file_name must be a plain file name",
                table
            )));
        }
        if self.lease_duration.is_zero() {
            return Err(ConfigError::Invalid(format!(
                "{}.lease_duration must be positive",
                table
            )));
        }
        Ok(())
    }
}

/// Container names follow object-store rules so local and remote stores agree
pub fn is_valid_container_name(name: &str) -> bool {
    (3..=63).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--")
}

/// `[registry]` table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryConfig {
    /// Single blob-backed registry
    Blob(BlobRegistryConfig),
    /// Migration window: reads prefer primary, writes go to primary only
    Transitioning {
        primary: BlobRegistryConfig,
        fallback: BlobRegistryConfig,
    },
    /// Process-local registry
    Memory,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig::Blob(BlobRegistryConfig::default())
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            RegistryConfig::Blob(blob) => blob.validate("registry"),
            RegistryConfig::Transitioning { primary, fallback } => {
                primary.validate("registry.primary")?;
                fallback.validate("registry.fallback")?;
                if primary == fallback {
                    return Err(ConfigError::Invalid(
                        "registry.primary and registry.fallback point at the same record"
                            .to_string(),
                    ));
                }
                Ok(())
            }
            RegistryConfig::Memory => Ok(()),
        }
    }
}
