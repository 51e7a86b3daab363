// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry kept as a single JSON record in an object store

use super::{CheckpointRegistry, RegistryError};
use crate::blob_adapter::BlobStorageAdapter;
use async_trait::async_trait;
use lrep_adapters::BlobStore;
use lrep_core::{
    BlobPath, CheckpointId, CheckpointState, Clock, OperationContext, RegistryRecord,
    StreamPosition, SystemClock,
};

/// Checkpoint registry backed by one blob
///
/// Registration overwrites the record unconditionally: the last writer wins
/// and positions are not required to move forward.
pub struct BlobCheckpointRegistry<S: BlobStore, C: Clock = SystemClock> {
    adapter: BlobStorageAdapter<S, C>,
    path: BlobPath,
    producer: Option<String>,
}

impl<S: BlobStore, C: Clock> BlobCheckpointRegistry<S, C> {
    pub fn new(
        adapter: BlobStorageAdapter<S, C>,
        container: impl Into<String>,
        blob_name: impl Into<String>,
    ) -> Self {
        Self {
            adapter,
            path: BlobPath::new(container, blob_name),
            producer: None,
        }
    }

    /// Name recorded on every checkpoint this registry writes
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }

    pub fn path(&self) -> &BlobPath {
        &self.path
    }

    pub fn adapter(&self) -> &BlobStorageAdapter<S, C> {
        &self.adapter
    }
}

#[async_trait]
impl<S: BlobStore, C: Clock> CheckpointRegistry for BlobCheckpointRegistry<S, C> {
    async fn get_checkpoint_state(
        &self,
        ctx: &OperationContext,
    ) -> Result<Option<CheckpointState>, RegistryError> {
        let span = tracing::info_span!("registry.get", path = %self.path);
        let _guard = span.enter();

        let Some(blob) = self.adapter.read(ctx, &self.path).await? else {
            tracing::debug!("no checkpoint registered");
            return Ok(None);
        };
        let record = RegistryRecord::from_bytes(&blob.data)?;
        tracing::debug!(checkpoint = %record.state.checkpoint_id, "checkpoint found");
        Ok(Some(record.state))
    }

    async fn register_checkpoint(
        &self,
        ctx: &OperationContext,
        checkpoint_id: CheckpointId,
        stream_position: StreamPosition,
    ) -> Result<CheckpointState, RegistryError> {
        let span = tracing::info_span!(
            "registry.register",
            path = %self.path,
            checkpoint = %checkpoint_id,
            position = %stream_position,
        );
        let _guard = span.enter();

        let mut state = CheckpointState::new(
            checkpoint_id,
            stream_position,
            self.adapter.clock().utc_now(),
        );
        if let Some(producer) = &self.producer {
            state = state.with_producer(producer.clone());
        }
        let data = RegistryRecord::new(state.clone()).to_bytes()?;
        let etag = self.adapter.write(ctx, &self.path, &data).await?;
        tracing::info!(etag = %etag, "checkpoint registered");
        Ok(state)
    }
}

#[cfg(test)]
#[path = "blob_tests.rs"]
mod tests;
