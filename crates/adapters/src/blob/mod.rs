// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object store adapters

mod local;

pub use local::LocalBlobStore;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{BlobCall, FakeBlobStore};

use async_trait::async_trait;
use lrep_core::{BlobPath, Classify, ETag, ErrorClass, LeaseId, WriteCondition};
use lrep_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

/// Errors from object store operations
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),
    #[error("blob not found: {0}")]
    BlobNotFound(String),
    #[error("condition not met for {path}: {reason}")]
    PreconditionFailed { path: String, reason: String },
    #[error("blob {0} is leased by another holder")]
    LeaseConflict(String),
    #[error("lease on {0} was lost")]
    LeaseLost(String),
    #[error("store is busy: {0}")]
    Throttled(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("access denied: {0}")]
    Unauthorized(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for BlobError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ContainerNotFound(c) => BlobError::ContainerNotFound(c),
            StorageError::BlobNotFound(p) => BlobError::BlobNotFound(p),
            StorageError::PreconditionFailed { path, reason } => {
                BlobError::PreconditionFailed { path, reason }
            }
            StorageError::LeaseConflict(p) => BlobError::LeaseConflict(p),
            StorageError::LeaseMismatch(p) => BlobError::LeaseLost(p),
            StorageError::InvalidName(n) => BlobError::InvalidRequest(n),
            other => BlobError::Storage(other),
        }
    }
}

impl Classify for BlobError {
    fn class(&self) -> ErrorClass {
        match self {
            BlobError::ContainerNotFound(_) | BlobError::BlobNotFound(_) => ErrorClass::NotFound,
            BlobError::PreconditionFailed { .. } | BlobError::LeaseLost(_) => ErrorClass::Conflict,
            BlobError::LeaseConflict(_) | BlobError::Throttled(_) | BlobError::Unavailable(_) => {
                ErrorClass::Transient
            }
            BlobError::Unauthorized(_) | BlobError::InvalidRequest(_) => ErrorClass::Fatal,
            BlobError::Storage(e) => e.class(),
        }
    }
}

/// Blob contents with the version token they were read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub etag: ETag,
}

/// Adapter for a remote (or local) object store
#[async_trait]
pub trait BlobStore: Clone + Send + Sync + 'static {
    /// Whether uploads honor `IfMatch`
    ///
    /// Stores that cannot are driven through leases instead. Every store must
    /// honor `IfNoneMatch` and `Lease` conditions.
    fn supports_conditional_writes(&self) -> bool;

    async fn container_exists(&self, container: &str) -> Result<bool, BlobError>;

    /// Create a container; returns true if this call created it
    async fn create_container_if_not_exists(&self, container: &str) -> Result<bool, BlobError>;

    /// Download a blob; `None` if the container exists but the blob does not
    async fn download(&self, path: &BlobPath) -> Result<Option<Blob>, BlobError>;

    /// Upload a blob if `condition` holds; returns the new version token
    async fn upload(
        &self,
        path: &BlobPath,
        data: Vec<u8>,
        condition: WriteCondition,
    ) -> Result<ETag, BlobError>;

    /// Acquire an exclusive lease on an existing blob
    async fn acquire_lease(&self, path: &BlobPath, duration: Duration)
        -> Result<LeaseId, BlobError>;

    async fn release_lease(&self, path: &BlobPath, lease: &LeaseId) -> Result<(), BlobError>;
}
