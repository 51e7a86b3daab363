// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retry loop driven by a [`RetryPolicy`]
//!
//! Callers own the loop so each iteration can re-read whatever state it
//! depends on:
//!
//! ```ignore
//! let mut retry = Retry::start(&policy, &clock, &ctx, "read");
//! loop {
//!     retry.live()?;
//!     match attempt().await {
//!         Ok(value) => return Ok(value),
//!         Err(e) => retry.failed(e).await?,
//!     }
//! }
//! ```

use lrep_core::{Backoff, Classify, Clock, OperationContext, RetryPolicy};
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

/// Why a retry loop stopped without success
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// The error is not worth retrying
    Fatal(E),
    /// Attempt or elapsed-time budget spent
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last: E,
    },
    Cancelled,
}

/// State of one retry loop
pub struct Retry<'a, C: Clock, E> {
    backoff: Backoff<'a>,
    clock: &'a C,
    ctx: &'a OperationContext,
    operation: &'static str,
    _error: PhantomData<fn(E)>,
}

impl<'a, C: Clock, E: Classify + fmt::Display> Retry<'a, C, E> {
    pub fn start(
        policy: &'a RetryPolicy,
        clock: &'a C,
        ctx: &'a OperationContext,
        operation: &'static str,
    ) -> Self {
        Self {
            backoff: Backoff::start(policy, clock.now()),
            clock,
            ctx,
            operation,
            _error: PhantomData,
        }
    }

    /// Failed attempts so far
    pub fn attempts(&self) -> u32 {
        self.backoff.attempts()
    }

    /// Check for cancellation before starting an attempt
    pub fn live(&self) -> Result<(), RetryFailure<E>> {
        if self.ctx.is_cancelled() {
            return Err(RetryFailure::Cancelled);
        }
        Ok(())
    }

    /// Record a failed attempt
    ///
    /// Sleeps out the backoff and returns `Ok(())` when another attempt is
    /// allowed. Cancellation interrupts the sleep.
    pub async fn failed(&mut self, error: E) -> Result<(), RetryFailure<E>> {
        if !error.is_retryable() {
            tracing::warn!(
                operation = self.operation,
                class = %error.class(),
                error = %error,
                "not retrying"
            );
            return Err(RetryFailure::Fatal(error));
        }

        let now = self.clock.now();
        let Some(delay) = self.backoff.next_delay(now) else {
            let attempts = self.backoff.attempts();
            let elapsed = self.backoff.elapsed(now);
            tracing::warn!(
                operation = self.operation,
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %error,
                "retries exhausted"
            );
            return Err(RetryFailure::Exhausted {
                attempts,
                elapsed,
                last: error,
            });
        };

        tracing::debug!(
            operation = self.operation,
            attempt = self.backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            class = %error.class(),
            error = %error,
            "retrying"
        );

        tokio::select! {
            _ = self.ctx.cancelled() => Err(RetryFailure::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
