// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only partition logs
//!
//! Each partition is a newline-delimited JSON file of checksummed entries.
//! Writers append under an advisory lock; cursors tail the file by offset.

mod cursor;
mod entry;
mod writer;

pub use cursor::LogCursor;
pub use entry::LogEntry;
pub use writer::LogWriter;

use std::path::{Path, PathBuf};

/// File holding one partition of one stream under `root`
pub fn partition_log_path(root: &Path, entity: &str, partition: &str) -> PathBuf {
    root.join(entity).join(format!("{}.log", partition))
}
