// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory blob store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Blob, BlobError, BlobStore};
use async_trait::async_trait;
use lrep_core::{BlobPath, ETag, LeaseId, WriteCondition};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded blob store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobCall {
    ContainerExists { container: String },
    CreateContainer { container: String },
    Download { path: BlobPath },
    Upload { path: BlobPath, condition: WriteCondition },
    AcquireLease { path: BlobPath },
    ReleaseLease { path: BlobPath, lease: LeaseId },
}

#[derive(Debug, Clone)]
struct FakeBlob {
    data: Vec<u8>,
    etag: ETag,
    lease: Option<LeaseId>,
}

#[derive(Default)]
struct FakeBlobState {
    containers: HashMap<String, HashMap<String, FakeBlob>>,
    next_version: u64,
    /// Calls left that fail with a transient error
    fail_next: u32,
    /// Probability that any call fails with a transient error
    failure_rate: f64,
    deny_access: bool,
    no_conditional_writes: bool,
}

impl FakeBlobState {
    fn inject_failure(&mut self) -> Result<(), BlobError> {
        if self.deny_access {
            return Err(BlobError::Unauthorized("access denied by test".to_string()));
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(BlobError::Unavailable("injected failure".to_string()));
        }
        if self.failure_rate > 0.0 && rand::rng().random_bool(self.failure_rate) {
            return Err(BlobError::Throttled("injected flakiness".to_string()));
        }
        Ok(())
    }

    fn container(&mut self, name: &str) -> Result<&mut HashMap<String, FakeBlob>, BlobError> {
        self.containers
            .get_mut(name)
            .ok_or_else(|| BlobError::ContainerNotFound(name.to_string()))
    }

    fn bump(&mut self) -> ETag {
        self.next_version += 1;
        ETag::new(format!("v{}", self.next_version))
    }
}

/// In-memory blob store with fault injection
///
/// Leases never expire on their own; tests release or expire them
/// explicitly.
#[derive(Clone, Default)]
pub struct FakeBlobStore {
    state: Arc<Mutex<FakeBlobState>>,
    calls: Arc<Mutex<Vec<BlobCall>>>,
}

impl FakeBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that ignores `IfMatch`, forcing callers onto leases
    ///
    /// `IfNoneMatch` and lease conditions are still enforced.
    pub fn without_conditional_writes() -> Self {
        let store = Self::default();
        store.lock().no_conditional_writes = true;
        store
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<BlobCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Fail the next `n` calls with a transient error
    pub fn fail_next(&self, n: u32) {
        self.lock().fail_next = n;
    }

    /// Fail each call with a transient error with probability `rate`
    pub fn set_failure_rate(&self, rate: f64) {
        self.lock().failure_rate = rate.clamp(0.0, 1.0);
    }

    /// Fail every call with an authorization error
    pub fn deny_access(&self, deny: bool) {
        self.lock().deny_access = deny;
    }

    pub fn has_container(&self, container: &str) -> bool {
        self.lock().containers.contains_key(container)
    }

    /// Current contents of a blob, bypassing fault injection
    pub fn get(&self, path: &BlobPath) -> Option<Vec<u8>> {
        self.lock()
            .containers
            .get(&path.container)
            .and_then(|c| c.get(&path.name))
            .map(|b| b.data.clone())
    }

    /// Whether a lease is currently held on the blob
    pub fn is_leased(&self, path: &BlobPath) -> bool {
        self.lock()
            .containers
            .get(&path.container)
            .and_then(|c| c.get(&path.name))
            .is_some_and(|b| b.lease.is_some())
    }

    /// Drop the lease on a blob as if its duration had run out
    pub fn expire_lease(&self, path: &BlobPath) {
        if let Some(blob) = self
            .lock()
            .containers
            .get_mut(&path.container)
            .and_then(|c| c.get_mut(&path.name))
        {
            blob.lease = None;
        }
    }

    /// Overwrite a blob directly, as another writer would
    ///
    /// Bypasses fault injection, lease checks and the call log.
    pub fn put(&self, path: &BlobPath, data: Vec<u8>) {
        let mut state = self.lock();
        let etag = state.bump();
        let container = state.containers.entry(path.container.clone()).or_default();
        let lease = container.get(&path.name).and_then(|b| b.lease.clone());
        container.insert(path.name.clone(), FakeBlob { data, etag, lease });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeBlobState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: BlobCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    fn supports_conditional_writes(&self) -> bool {
        !self.lock().no_conditional_writes
    }

    async fn container_exists(&self, container: &str) -> Result<bool, BlobError> {
        self.record(BlobCall::ContainerExists {
            container: container.to_string(),
        });
        let mut state = self.lock();
        state.inject_failure()?;
        Ok(state.containers.contains_key(container))
    }

    async fn create_container_if_not_exists(&self, container: &str) -> Result<bool, BlobError> {
        self.record(BlobCall::CreateContainer {
            container: container.to_string(),
        });
        let mut state = self.lock();
        state.inject_failure()?;
        if state.containers.contains_key(container) {
            return Ok(false);
        }
        state
            .containers
            .insert(container.to_string(), HashMap::new());
        Ok(true)
    }

    async fn download(&self, path: &BlobPath) -> Result<Option<Blob>, BlobError> {
        self.record(BlobCall::Download { path: path.clone() });
        let mut state = self.lock();
        state.inject_failure()?;
        Ok(state.container(&path.container)?.get(&path.name).map(|b| Blob {
            data: b.data.clone(),
            etag: b.etag.clone(),
        }))
    }

    async fn upload(
        &self,
        path: &BlobPath,
        data: Vec<u8>,
        condition: WriteCondition,
    ) -> Result<ETag, BlobError> {
        self.record(BlobCall::Upload {
            path: path.clone(),
            condition: condition.clone(),
        });
        let mut state = self.lock();
        state.inject_failure()?;
        let match_versions = !state.no_conditional_writes;
        let etag = state.bump();
        let container = state.container(&path.container)?;
        let existing = container.get(&path.name);

        let lease = existing.and_then(|b| b.lease.clone());
        match (&lease, &condition) {
            (Some(held), WriteCondition::Lease(presented)) if held == presented => {}
            (_, WriteCondition::Lease(_)) => return Err(BlobError::LeaseLost(path.to_string())),
            (Some(_), _) => return Err(BlobError::LeaseConflict(path.to_string())),
            (None, _) => {}
        }

        let current = existing.map(|b| &b.etag);
        let holds = match &condition {
            WriteCondition::IfMatch(expected) => !match_versions || current == Some(expected),
            WriteCondition::IfNoneMatch => current.is_none(),
            WriteCondition::None | WriteCondition::Lease(_) => true,
        };
        if !holds {
            return Err(BlobError::PreconditionFailed {
                path: path.to_string(),
                reason: format!("{} does not hold", condition),
            });
        }

        container.insert(
            path.name.clone(),
            FakeBlob {
                data,
                etag: etag.clone(),
                lease,
            },
        );
        Ok(etag)
    }

    async fn acquire_lease(
        &self,
        path: &BlobPath,
        _duration: Duration,
    ) -> Result<LeaseId, BlobError> {
        self.record(BlobCall::AcquireLease { path: path.clone() });
        let mut state = self.lock();
        state.inject_failure()?;
        state.next_version += 1;
        let lease = LeaseId::new(format!("lease-{}", state.next_version));
        let blob = state
            .container(&path.container)?
            .get_mut(&path.name)
            .ok_or_else(|| BlobError::BlobNotFound(path.to_string()))?;
        if blob.lease.is_some() {
            return Err(BlobError::LeaseConflict(path.to_string()));
        }
        blob.lease = Some(lease.clone());
        Ok(lease)
    }

    async fn release_lease(&self, path: &BlobPath, lease: &LeaseId) -> Result<(), BlobError> {
        self.record(BlobCall::ReleaseLease {
            path: path.clone(),
            lease: lease.clone(),
        });
        let mut state = self.lock();
        state.inject_failure()?;
        let Some(blob) = state.container(&path.container)?.get_mut(&path.name) else {
            return Ok(());
        };
        if blob.lease.as_ref().is_some_and(|held| held != lease) {
            return Err(BlobError::LeaseLost(path.to_string()));
        }
        blob.lease = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
