// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors from local durable storage

use lrep_core::{Classify, ErrorClass};
use std::io;
use thiserror::Error;

/// Errors that can occur in local log and blob operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupted log entry at line {line}: {reason}")]
    Corrupted { line: u64, reason: String },
    #[error("checksum mismatch at line {line}")]
    ChecksumMismatch { line: u64 },
    #[error("container not found: {0}")]
    ContainerNotFound(String),
    #[error("blob not found: {0}")]
    BlobNotFound(String),
    #[error("condition not met for {path}: {reason}")]
    PreconditionFailed { path: String, reason: String },
    #[error("blob {0} is leased by another holder")]
    LeaseConflict(String),
    #[error("lease on {0} is missing, expired or held by someone else")]
    LeaseMismatch(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
}

impl Classify for StorageError {
    fn class(&self) -> ErrorClass {
        match self {
            StorageError::Io(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                ErrorClass::Fatal
            }
            StorageError::Io(_) => ErrorClass::Transient,
            StorageError::Json(_)
            | StorageError::Corrupted { .. }
            | StorageError::ChecksumMismatch { .. }
            | StorageError::InvalidName(_) => ErrorClass::Fatal,
            StorageError::ContainerNotFound(_) | StorageError::BlobNotFound(_) => {
                ErrorClass::NotFound
            }
            StorageError::PreconditionFailed { .. } | StorageError::LeaseMismatch(_) => {
                ErrorClass::Conflict
            }
            StorageError::LeaseConflict(_) => ErrorClass::Transient,
        }
    }
}
