// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: object stores and event streams

pub mod blob;
pub mod stream;
pub mod traced;

pub use blob::{Blob, BlobError, BlobStore, LocalBlobStore};
pub use stream::{
    PartitionReceiver, PartitionSender, StreamConnection, StreamError, StreamTransport,
    LocalStreamTransport,
};
pub use traced::TracedBlobStore;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use blob::{BlobCall, FakeBlobStore};
#[cfg(any(test, feature = "test-support"))]
pub use stream::{FakeStreamTransport, StreamCall};
