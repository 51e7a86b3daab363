// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure classification shared by every boundary

use std::fmt;

/// How a failure should be handled by callers and retry loops
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Timeouts, throttling, lease conflicts, dropped connections: retry
    Transient,
    /// Object or container absent; a valid outcome on read paths
    NotFound,
    /// Version token mismatch on a conditional write
    Conflict,
    /// Bad credentials, malformed identity or request: never retried
    Fatal,
    /// Component shutting down or caller cancelled
    Shutdown,
}

impl ErrorClass {
    /// Whether a retry loop may try the operation again
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Transient | ErrorClass::Conflict)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Transient => "transient",
            ErrorClass::NotFound => "not-found",
            ErrorClass::Conflict => "conflict",
            ErrorClass::Fatal => "fatal",
            ErrorClass::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Errors that know which [`ErrorClass`] they belong to
pub trait Classify {
    fn class(&self) -> ErrorClass;

    fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }
}
