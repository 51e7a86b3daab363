// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lrep-core: shared types for the location replication substrate
//!
//! This crate provides:
//! - Stream positions, events and checkpoint state
//! - Retry policy and backoff bookkeeping
//! - Error classification used by every retry decision
//! - Clock and id abstractions for deterministic tests
//! - TOML configuration

pub mod blob;
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod id;
pub mod position;
pub mod retry;

pub use blob::{BlobPath, ETag, LeaseId, WriteCondition};
pub use checkpoint::{CheckpointId, CheckpointState, RecordError, RegistryRecord};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, ReplicationConfig};
pub use context::OperationContext;
pub use error::{Classify, ErrorClass};
pub use event::{Event, PartitionId, ReceivedEvent, MAX_EVENT_BYTES};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use position::{ParsePositionError, StreamPosition};
pub use retry::{Backoff, BackoffKind, RetryPolicy, RetryPolicyError};
