// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint id generation

use crate::checkpoint::CheckpointId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates unique checkpoint identifiers
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> CheckpointId;
}

/// UUID-based generator for production use
///
/// Ids are prefixed with the node name so operators can tell which producer
/// wrote a checkpoint without opening the record.
#[derive(Clone, Debug, Default)]
pub struct UuidIdGen {
    node: Option<String>,
}

impl UuidIdGen {
    pub fn for_node(node: impl Into<String>) -> Self {
        Self {
            node: Some(node.into()),
        }
    }
}

impl IdGen for UuidIdGen {
    fn next(&self) -> CheckpointId {
        let uuid = uuid::Uuid::new_v4();
        match &self.node {
            Some(node) => CheckpointId::new(format!("{}/{}", node, uuid)),
            None => CheckpointId::new(uuid.to_string()),
        }
    }
}

/// Sequential generator for testing
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("checkpoint")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> CheckpointId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        CheckpointId::new(format!("{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
