// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-local registry

use super::{CheckpointRegistry, RegistryError};
use async_trait::async_trait;
use lrep_core::{
    CheckpointId, CheckpointState, Clock, OperationContext, StreamPosition, SystemClock,
};
use std::sync::{Arc, Mutex};

/// Registry that lives only as long as the process
#[derive(Clone, Default)]
pub struct InMemoryCheckpointRegistry<C: Clock = SystemClock> {
    current: Arc<Mutex<Option<CheckpointState>>>,
    clock: C,
}

impl InMemoryCheckpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Clock> InMemoryCheckpointRegistry<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            current: Arc::default(),
            clock,
        }
    }
}

#[async_trait]
impl<C: Clock> CheckpointRegistry for InMemoryCheckpointRegistry<C> {
    async fn get_checkpoint_state(
        &self,
        _ctx: &OperationContext,
    ) -> Result<Option<CheckpointState>, RegistryError> {
        Ok(self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn register_checkpoint(
        &self,
        _ctx: &OperationContext,
        checkpoint_id: CheckpointId,
        stream_position: StreamPosition,
    ) -> Result<CheckpointState, RegistryError> {
        let state = CheckpointState::new(checkpoint_id, stream_position, self.clock.utc_now());
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(state.clone());
        Ok(state)
    }
}
