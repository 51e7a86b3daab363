// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-operation context carrying the cancellation signal

use tokio_util::sync::CancellationToken;

/// Context threaded through every network-touching operation
///
/// Cloning shares the same cancellation token. `child()` derives a token that
/// is cancelled with its parent but can also be cancelled on its own.
#[derive(Clone, Debug, Default)]
pub struct OperationContext {
    token: CancellationToken,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Resolves once the operation has been cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
