// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::blob::{Blob, BlobError, BlobStore};
use async_trait::async_trait;
use lrep_core::{BlobPath, Classify, ETag, LeaseId, WriteCondition};
use std::time::Duration;

/// Wrapper that adds tracing to any BlobStore
#[derive(Clone)]
pub struct TracedBlobStore<S> {
    inner: S,
}

impl<S> TracedBlobStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: BlobStore> BlobStore for TracedBlobStore<S> {
    fn supports_conditional_writes(&self) -> bool {
        self.inner.supports_conditional_writes()
    }

    async fn container_exists(&self, container: &str) -> Result<bool, BlobError> {
        let result = self.inner.container_exists(container).await;
        tracing::trace!(container, exists = ?result.as_ref().ok(), "checked");
        result
    }

    async fn create_container_if_not_exists(&self, container: &str) -> Result<bool, BlobError> {
        let span = tracing::info_span!("blob.create_container", container);
        let _guard = span.enter();

        let result = self.inner.create_container_if_not_exists(container).await;
        match &result {
            Ok(true) => tracing::info!("container created"),
            Ok(false) => tracing::debug!("container already exists"),
            Err(e) => tracing::error!(error = %e, "create container failed"),
        }
        result
    }

    async fn download(&self, path: &BlobPath) -> Result<Option<Blob>, BlobError> {
        let span = tracing::info_span!("blob.download", path = %path);
        let _guard = span.enter();

        let start = std::time::Instant::now();
        let result = self.inner.download(path).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(Some(blob)) => tracing::debug!(
                etag = %blob.etag,
                bytes = blob.data.len(),
                elapsed_ms,
                "downloaded"
            ),
            Ok(None) => tracing::debug!(elapsed_ms, "blob absent"),
            Err(e) => tracing::warn!(
                elapsed_ms,
                class = %e.class(),
                error = %e,
                "download failed"
            ),
        }
        result
    }

    async fn upload(
        &self,
        path: &BlobPath,
        data: Vec<u8>,
        condition: WriteCondition,
    ) -> Result<ETag, BlobError> {
        let span = tracing::info_span!("blob.upload", path = %path, condition = %condition);
        let _guard = span.enter();

        tracing::debug!(bytes = data.len(), "uploading");
        let start = std::time::Instant::now();
        let result = self.inner.upload(path, data, condition).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(etag) => tracing::info!(etag = %etag, elapsed_ms, "uploaded"),
            Err(e) => tracing::warn!(
                elapsed_ms,
                class = %e.class(),
                error = %e,
                "upload failed"
            ),
        }
        result
    }

    async fn acquire_lease(
        &self,
        path: &BlobPath,
        duration: Duration,
    ) -> Result<LeaseId, BlobError> {
        let span = tracing::info_span!(
            "blob.acquire_lease",
            path = %path,
            duration_secs = duration.as_secs()
        );
        let _guard = span.enter();

        let result = self.inner.acquire_lease(path, duration).await;
        match &result {
            Ok(lease) => tracing::debug!(lease = %lease, "lease acquired"),
            Err(e) => tracing::warn!(class = %e.class(), error = %e, "lease not acquired"),
        }
        result
    }

    async fn release_lease(&self, path: &BlobPath, lease: &LeaseId) -> Result<(), BlobError> {
        let span = tracing::info_span!("blob.release_lease", path = %path, lease = %lease);
        let _guard = span.enter();

        let result = self.inner.release_lease(path, lease).await;
        // Release failing is tolerable; the lease expires on its own
        match &result {
            Ok(()) => tracing::debug!("lease released"),
            Err(e) => tracing::warn!(error = %e, "release failed (lease will expire)"),
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
