// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry used while moving checkpoints from one store to another
//!
//! Reads prefer the new (primary) registry and fall back to the old one only
//! when the primary fails outright. Writes go to the primary alone; the
//! fallback is probed alongside so operators see when it becomes unreachable,
//! but it is never written during the migration.

use super::{CheckpointRegistry, RegistryError};
use async_trait::async_trait;
use lrep_core::{CheckpointId, CheckpointState, Classify, OperationContext, StreamPosition};

/// Primary/fallback composition of two registries
pub struct TransitioningCheckpointRegistry<P, F> {
    primary: P,
    fallback: F,
}

impl<P: CheckpointRegistry, F: CheckpointRegistry> TransitioningCheckpointRegistry<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

#[async_trait]
impl<P: CheckpointRegistry, F: CheckpointRegistry> CheckpointRegistry
    for TransitioningCheckpointRegistry<P, F>
{
    async fn get_checkpoint_state(
        &self,
        ctx: &OperationContext,
    ) -> Result<Option<CheckpointState>, RegistryError> {
        // An absent primary checkpoint is an answer, not a failure
        let primary = match self.primary.get_checkpoint_state(ctx).await {
            Ok(state) => return Ok(state),
            Err(e) => e,
        };
        tracing::warn!(
            error = %primary,
            class = %primary.class(),
            "primary registry read failed, trying fallback"
        );

        match self.fallback.get_checkpoint_state(ctx).await {
            Ok(state) => {
                tracing::info!(found = state.is_some(), "checkpoint read from fallback registry");
                Ok(state)
            }
            Err(fallback) => {
                tracing::error!(error = %fallback, "fallback registry read failed");
                Err(RegistryError::BothFailed {
                    primary: Box::new(primary),
                    fallback: Box::new(fallback),
                })
            }
        }
    }

    async fn register_checkpoint(
        &self,
        ctx: &OperationContext,
        checkpoint_id: CheckpointId,
        stream_position: StreamPosition,
    ) -> Result<CheckpointState, RegistryError> {
        let (written, probed) = tokio::join!(
            self.primary
                .register_checkpoint(ctx, checkpoint_id, stream_position),
            self.fallback.get_checkpoint_state(ctx),
        );

        if let Err(e) = &probed {
            tracing::warn!(error = %e, "fallback registry probe failed");
        }
        if let Err(e) = &written {
            tracing::error!(error = %e, "primary registry write failed");
        }
        written
    }
}

#[cfg(test)]
#[path = "transitioning_tests.rs"]
mod tests;
