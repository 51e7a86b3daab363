// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Replication engine: retrying storage access, checkpoint registries and
//! the event stream client

pub mod blob_adapter;
pub mod registry;
mod retry;
pub mod stream_client;

pub use blob_adapter::{AdapterError, BlobStorageAdapter};
pub use registry::{
    build_registry, BlobCheckpointRegistry, CheckpointRegistry, InMemoryCheckpointRegistry,
    RegistryError, TransitioningCheckpointRegistry,
};
pub use retry::{Retry, RetryFailure};
pub use stream_client::{
    ChannelHandler, ClientState, EventStreamClient, ReceiveHandler, StreamClientError,
};
