// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local filesystem blob store

use super::{Blob, BlobError, BlobStore};
use async_trait::async_trait;
use lrep_core::{BlobPath, Clock, ETag, LeaseId, SystemClock, WriteCondition};
use lrep_storage::BlobDir;
use std::path::PathBuf;
use std::time::Duration;

/// Blob store backed by a directory tree
///
/// Safe to share between processes on one host; concurrent writers are
/// serialized by advisory file locks.
#[derive(Clone)]
pub struct LocalBlobStore<C: Clock = SystemClock> {
    dir: BlobDir,
    clock: C,
}

impl LocalBlobStore<SystemClock> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, SystemClock)
    }
}

impl<C: Clock> LocalBlobStore<C> {
    /// Lease expiry is judged against `clock`
    pub fn with_clock(root: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            dir: BlobDir::new(root),
            clock,
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, BlobError>
    where
        T: Send + 'static,
        F: FnOnce(BlobDir) -> Result<T, lrep_storage::StorageError> + Send + 'static,
    {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || f(dir))
            .await
            .map_err(|e| BlobError::Unavailable(format!("blob task failed: {}", e)))?
            .map_err(BlobError::from)
    }
}

#[async_trait]
impl<C: Clock> BlobStore for LocalBlobStore<C> {
    fn supports_conditional_writes(&self) -> bool {
        true
    }

    async fn container_exists(&self, container: &str) -> Result<bool, BlobError> {
        let container = container.to_string();
        self.blocking(move |dir| dir.container_exists(&container))
            .await
    }

    async fn create_container_if_not_exists(&self, container: &str) -> Result<bool, BlobError> {
        let container = container.to_string();
        self.blocking(move |dir| dir.create_container(&container))
            .await
    }

    async fn download(&self, path: &BlobPath) -> Result<Option<Blob>, BlobError> {
        let path = path.clone();
        let stored = self.blocking(move |dir| dir.read(&path)).await?;
        Ok(stored.map(|s| Blob {
            data: s.data,
            etag: s.etag,
        }))
    }

    async fn upload(
        &self,
        path: &BlobPath,
        data: Vec<u8>,
        condition: WriteCondition,
    ) -> Result<ETag, BlobError> {
        let path = path.clone();
        let now = self.clock.utc_now();
        self.blocking(move |dir| dir.write(&path, &data, &condition, now))
            .await
    }

    async fn acquire_lease(
        &self,
        path: &BlobPath,
        duration: Duration,
    ) -> Result<LeaseId, BlobError> {
        let path = path.clone();
        let now = self.clock.utc_now();
        self.blocking(move |dir| dir.acquire_lease(&path, duration, now))
            .await
    }

    async fn release_lease(&self, path: &BlobPath, lease: &LeaseId) -> Result<(), BlobError> {
        let path = path.clone();
        let lease = lease.clone();
        self.blocking(move |dir| dir.release_lease(&path, &lease))
            .await
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
