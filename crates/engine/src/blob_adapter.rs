// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retrying object-store access with safe read-modify-write
//!
//! Reads never create containers and report a missing one as an absent
//! value. Writes create the container on demand. Read-modify-write re-reads
//! the version token on every attempt and writes conditionally, or, on stores
//! without conditional writes, under a lease on the value blob itself.
//!
//! A zero-length blob reads as absent: the lease path creates one as the
//! thing to lease before the first value exists.

use crate::retry::{Retry, RetryFailure};
use lrep_adapters::{Blob, BlobError, BlobStore};
use lrep_core::{
    BlobPath, Classify, Clock, ETag, ErrorClass, LeaseId, OperationContext, RetryPolicy,
    SystemClock, WriteCondition,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Default lease length on the lease path
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(60);

/// Errors from the storage adapter
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{operation} {path} failed: {source}")]
    Store {
        operation: &'static str,
        path: String,
        #[source]
        source: BlobError,
    },
    #[error("value at {path} is not valid JSON: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("gave up after {attempts} attempts in {elapsed:?}: {last}")]
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last: Box<AdapterError>,
    },
    #[error("operation cancelled")]
    Cancelled,
}

impl AdapterError {
    fn store(operation: &'static str, path: &BlobPath, source: BlobError) -> Self {
        AdapterError::Store {
            operation,
            path: path.to_string(),
            source,
        }
    }

    fn malformed(path: &BlobPath, source: serde_json::Error) -> Self {
        AdapterError::Malformed {
            path: path.to_string(),
            source,
        }
    }
}

impl Classify for AdapterError {
    fn class(&self) -> ErrorClass {
        match self {
            AdapterError::Store { source, .. } => source.class(),
            AdapterError::Malformed { .. } => ErrorClass::Fatal,
            AdapterError::Exhausted { .. } => ErrorClass::Transient,
            AdapterError::Cancelled => ErrorClass::Shutdown,
        }
    }
}

impl From<RetryFailure<AdapterError>> for AdapterError {
    fn from(failure: RetryFailure<AdapterError>) -> Self {
        match failure {
            RetryFailure::Fatal(e) => e,
            RetryFailure::Exhausted {
                attempts,
                elapsed,
                last,
            } => AdapterError::Exhausted {
                attempts,
                elapsed,
                last: Box::new(last),
            },
            RetryFailure::Cancelled => AdapterError::Cancelled,
        }
    }
}

/// Object-store adapter with retry policy and container bootstrap
#[derive(Clone)]
pub struct BlobStorageAdapter<S: BlobStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    policy: RetryPolicy,
    lease_duration: Duration,
}

impl<S: BlobStore> BlobStorageAdapter<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: BlobStore, C: Clock> BlobStorageAdapter<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            policy: RetryPolicy::default(),
            lease_duration: DEFAULT_LEASE_DURATION,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_lease_duration(mut self, duration: Duration) -> Self {
        self.lease_duration = duration;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Create the container if needed; returns whether it already existed
    pub async fn ensure_container_exists(
        &self,
        ctx: &OperationContext,
        container: &str,
    ) -> Result<bool, AdapterError> {
        let path = BlobPath::new(container, "");
        let mut retry = Retry::start(&self.policy, &self.clock, ctx, "ensure_container");
        loop {
            retry.live()?;
            match self.store.create_container_if_not_exists(container).await {
                Ok(created) => return Ok(!created),
                Err(e) => retry
                    .failed(AdapterError::store("create container", &path, e))
                    .await?,
            }
        }
    }

    /// Read a blob; a missing container or blob is `None`
    pub async fn read(
        &self,
        ctx: &OperationContext,
        path: &BlobPath,
    ) -> Result<Option<Blob>, AdapterError> {
        let mut retry = Retry::start(&self.policy, &self.clock, ctx, "read");
        loop {
            retry.live()?;
            match self.download(path).await {
                Ok(blob) => return Ok(blob.filter(|b| !b.data.is_empty())),
                Err(e) => retry.failed(e).await?,
            }
        }
    }

    /// Create or overwrite a blob unconditionally
    pub async fn write(
        &self,
        ctx: &OperationContext,
        path: &BlobPath,
        data: &[u8],
    ) -> Result<ETag, AdapterError> {
        let mut retry = Retry::start(&self.policy, &self.clock, ctx, "write");
        loop {
            retry.live()?;
            match self.upload(path, data, WriteCondition::None).await {
                Ok(etag) => return Ok(etag),
                Err(e) => retry.failed(e).await?,
            }
        }
    }

    /// Read, transform and write back without losing concurrent updates
    ///
    /// `transform` sees the current bytes (or `None`) and returns a result
    /// for the caller plus the new bytes. It runs once per attempt and may be
    /// called again after a conflict; errors it returns end the loop unless
    /// they are retryable.
    pub async fn read_modify_write<R, F>(
        &self,
        ctx: &OperationContext,
        path: &BlobPath,
        mut transform: F,
    ) -> Result<R, AdapterError>
    where
        R: Send,
        F: FnMut(Option<&[u8]>) -> Result<(R, Vec<u8>), AdapterError> + Send,
    {
        let leased = !self.store.supports_conditional_writes();
        let mut retry = Retry::start(&self.policy, &self.clock, ctx, "read_modify_write");
        loop {
            retry.live()?;
            let attempt = if leased {
                self.leased_attempt(path, &mut transform).await
            } else {
                self.conditional_attempt(path, &mut transform).await
            };
            match attempt {
                Ok(result) => {
                    tracing::debug!(
                        path = %path,
                        leased,
                        attempts = retry.attempts() + 1,
                        "read-modify-write committed"
                    );
                    return Ok(result);
                }
                Err(e) => retry.failed(e).await?,
            }
        }
    }

    /// Read and decode a JSON value
    pub async fn read_state<T: DeserializeOwned>(
        &self,
        ctx: &OperationContext,
        path: &BlobPath,
    ) -> Result<Option<T>, AdapterError> {
        match self.read(ctx, path).await? {
            Some(blob) => serde_json::from_slice(&blob.data)
                .map(Some)
                .map_err(|e| AdapterError::malformed(path, e)),
            None => Ok(None),
        }
    }

    /// Encode a value as JSON and write it unconditionally
    pub async fn write_state<T: Serialize + Sync>(
        &self,
        ctx: &OperationContext,
        path: &BlobPath,
        value: &T,
    ) -> Result<ETag, AdapterError> {
        let data = serde_json::to_vec(value).map_err(|e| AdapterError::malformed(path, e))?;
        self.write(ctx, path, &data).await
    }

    /// Typed read-modify-write over a JSON value
    pub async fn read_modify_write_state<T, R, F>(
        &self,
        ctx: &OperationContext,
        path: &BlobPath,
        mut transform: F,
    ) -> Result<R, AdapterError>
    where
        T: Serialize + DeserializeOwned,
        R: Send,
        F: FnMut(Option<T>) -> (R, T) + Send,
    {
        self.read_modify_write(ctx, path, |current| {
            let old = current
                .map(serde_json::from_slice::<T>)
                .transpose()
                .map_err(|e| AdapterError::malformed(path, e))?;
            let (result, new) = transform(old);
            let data = serde_json::to_vec(&new).map_err(|e| AdapterError::malformed(path, e))?;
            Ok((result, data))
        })
        .await
    }

    async fn download(&self, path: &BlobPath) -> Result<Option<Blob>, AdapterError> {
        match self.store.download(path).await {
            Ok(blob) => Ok(blob),
            Err(BlobError::ContainerNotFound(_)) => Ok(None),
            Err(e) => Err(AdapterError::store("download", path, e)),
        }
    }

    /// Upload, creating the container and trying once more if it is missing
    async fn upload(
        &self,
        path: &BlobPath,
        data: &[u8],
        condition: WriteCondition,
    ) -> Result<ETag, AdapterError> {
        match self
            .store
            .upload(path, data.to_vec(), condition.clone())
            .await
        {
            Err(BlobError::ContainerNotFound(_)) => {
                let created = self
                    .store
                    .create_container_if_not_exists(&path.container)
                    .await
                    .map_err(|e| AdapterError::store("create container", path, e))?;
                if created {
                    tracing::info!(container = %path.container, "created missing container");
                }
                self.store
                    .upload(path, data.to_vec(), condition)
                    .await
                    .map_err(|e| AdapterError::store("upload", path, e))
            }
            other => other.map_err(|e| AdapterError::store("upload", path, e)),
        }
    }

    async fn conditional_attempt<R, F>(
        &self,
        path: &BlobPath,
        transform: &mut F,
    ) -> Result<R, AdapterError>
    where
        F: FnMut(Option<&[u8]>) -> Result<(R, Vec<u8>), AdapterError>,
    {
        let current = self.download(path).await?;
        let (result, data) = transform(value(&current))?;
        let condition = match current {
            Some(blob) => WriteCondition::IfMatch(blob.etag),
            None => WriteCondition::IfNoneMatch,
        };
        self.upload(path, &data, condition).await?;
        Ok(result)
    }

    async fn leased_attempt<R, F>(
        &self,
        path: &BlobPath,
        transform: &mut F,
    ) -> Result<R, AdapterError>
    where
        F: FnMut(Option<&[u8]>) -> Result<(R, Vec<u8>), AdapterError>,
    {
        let lease = self.acquire_lease(path).await?;
        let outcome = self.modify_under_lease(path, &lease, transform).await;
        self.release_lease(path, &lease).await;
        outcome
    }

    /// Write only while `lease` is still ours; an expired lease is a conflict
    async fn modify_under_lease<R, F>(
        &self,
        path: &BlobPath,
        lease: &LeaseId,
        transform: &mut F,
    ) -> Result<R, AdapterError>
    where
        F: FnMut(Option<&[u8]>) -> Result<(R, Vec<u8>), AdapterError>,
    {
        let current = self.download(path).await?;
        let (result, data) = transform(value(&current))?;
        self.upload(path, &data, WriteCondition::Lease(lease.clone())).await?;
        Ok(result)
    }

    async fn acquire_lease(&self, path: &BlobPath) -> Result<LeaseId, AdapterError> {
        match self.store.acquire_lease(path, self.lease_duration).await {
            Ok(lease) => return Ok(lease),
            Err(BlobError::ContainerNotFound(_) | BlobError::BlobNotFound(_)) => {}
            Err(e) => return Err(AdapterError::store("acquire lease", path, e)),
        }

        // Leases need a blob; the first writer creates an empty one
        match self.upload(path, &[], WriteCondition::IfNoneMatch).await {
            Ok(_) => {}
            Err(e) if e.class() == ErrorClass::Conflict => {}
            Err(e) => return Err(e),
        }
        self.store
            .acquire_lease(path, self.lease_duration)
            .await
            .map_err(|e| AdapterError::store("acquire lease", path, e))
    }

    /// Release a lease, retrying transient failures
    ///
    /// Runs even when the caller was cancelled. A lease that cannot be
    /// released blocks other writers until it expires.
    async fn release_lease(&self, path: &BlobPath, lease: &LeaseId) {
        let ctx = OperationContext::new();
        let mut retry = Retry::start(&self.policy, &self.clock, &ctx, "release_lease");
        loop {
            match self.store.release_lease(path, lease).await {
                Ok(()) => return,
                Err(BlobError::LeaseLost(_)) => {
                    tracing::debug!(path = %path, lease = %lease, "lease already expired");
                    return;
                }
                Err(e) => {
                    let error = AdapterError::store("release lease", path, e);
                    if let Err(failure) = retry.failed(error).await {
                        let error = AdapterError::from(failure);
                        tracing::warn!(
                            path = %path,
                            lease = %lease,
                            error = %error,
                            "lease not released (it will expire)"
                        );
                        return;
                    }
                }
            }
        }
    }
}

/// Stored bytes, with the empty lease placeholder read as absent
fn value(blob: &Option<Blob>) -> Option<&[u8]> {
    blob.as_ref()
        .map(|b| b.data.as_slice())
        .filter(|data| !data.is_empty())
}

#[cfg(test)]
#[path = "blob_adapter_tests.rs"]
mod tests;
