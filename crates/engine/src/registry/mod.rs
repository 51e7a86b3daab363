// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint registries: where a node finds the latest snapshot to resume from

mod blob;
mod memory;
mod transitioning;

pub use blob::BlobCheckpointRegistry;
pub use memory::InMemoryCheckpointRegistry;
pub use transitioning::TransitioningCheckpointRegistry;

use crate::blob_adapter::{AdapterError, BlobStorageAdapter};
use async_trait::async_trait;
use lrep_adapters::{LocalBlobStore, TracedBlobStore};
use lrep_core::config::{BlobRegistryConfig, RegistryConfig};
use lrep_core::{
    CheckpointId, CheckpointState, Classify, Clock, ErrorClass, OperationContext, RecordError,
    RetryPolicy, StreamPosition,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry store error: {0}")]
    Store(#[from] AdapterError),
    #[error("registry record error: {0}")]
    Record(#[from] RecordError),
    #[error("primary registry failed ({primary}); fallback registry failed ({fallback})")]
    BothFailed {
        primary: Box<RegistryError>,
        fallback: Box<RegistryError>,
    },
}

impl Classify for RegistryError {
    fn class(&self) -> ErrorClass {
        match self {
            RegistryError::Store(e) => e.class(),
            RegistryError::Record(_) => ErrorClass::Fatal,
            RegistryError::BothFailed { primary, .. } => primary.class(),
        }
    }
}

/// Durable pointer to the latest checkpoint
#[async_trait]
pub trait CheckpointRegistry: Send + Sync + 'static {
    /// Latest registered checkpoint, or `None` when nothing was registered
    async fn get_checkpoint_state(
        &self,
        ctx: &OperationContext,
    ) -> Result<Option<CheckpointState>, RegistryError>;

    /// Record a checkpoint, replacing whatever was registered before
    async fn register_checkpoint(
        &self,
        ctx: &OperationContext,
        checkpoint_id: CheckpointId,
        stream_position: StreamPosition,
    ) -> Result<CheckpointState, RegistryError>;
}

#[async_trait]
impl<R: CheckpointRegistry + ?Sized> CheckpointRegistry for Arc<R> {
    async fn get_checkpoint_state(
        &self,
        ctx: &OperationContext,
    ) -> Result<Option<CheckpointState>, RegistryError> {
        (**self).get_checkpoint_state(ctx).await
    }

    async fn register_checkpoint(
        &self,
        ctx: &OperationContext,
        checkpoint_id: CheckpointId,
        stream_position: StreamPosition,
    ) -> Result<CheckpointState, RegistryError> {
        (**self)
            .register_checkpoint(ctx, checkpoint_id, stream_position)
            .await
    }
}

/// Build the registry described by configuration, backed by local blob stores
pub fn build_registry<C: Clock>(
    config: &RegistryConfig,
    policy: &RetryPolicy,
    clock: C,
    producer: &str,
) -> Arc<dyn CheckpointRegistry> {
    match config {
        RegistryConfig::Blob(blob) => Arc::new(blob_registry(blob, policy, clock, producer)),
        RegistryConfig::Transitioning { primary, fallback } => {
            Arc::new(TransitioningCheckpointRegistry::new(
                blob_registry(primary, policy, clock.clone(), producer),
                blob_registry(fallback, policy, clock, producer),
            ))
        }
        RegistryConfig::Memory => Arc::new(InMemoryCheckpointRegistry::with_clock(clock)),
    }
}

fn blob_registry<C: Clock>(
    config: &BlobRegistryConfig,
    policy: &RetryPolicy,
    clock: C,
    producer: &str,
) -> BlobCheckpointRegistry<TracedBlobStore<LocalBlobStore<C>>, C> {
    let store = TracedBlobStore::new(LocalBlobStore::with_clock(
        config.store_root.clone(),
        clock.clone(),
    ));
    let adapter = BlobStorageAdapter::with_clock(store, clock.clone())
        .with_policy(policy.clone())
        .with_lease_duration(config.lease_duration);
    BlobCheckpointRegistry::new(adapter, &config.container, config.blob_name())
        .with_producer(producer)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
