// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lrep-storage: local durable storage
//!
//! Partition logs back the local event stream; a blob directory backs the
//! local object store. Both are safe to share between processes.

mod blob_dir;
mod error;
pub mod log;

pub use blob_dir::{BlobDir, StoredBlob};
pub use error::StorageError;
pub use log::{partition_log_path, LogCursor, LogEntry, LogWriter};
