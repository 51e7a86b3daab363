// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry policy: backoff windows, jitter and attempt/elapsed budgets
//!
//! The policy itself is pure; [`Backoff`] tracks one operation's progress
//! through it. Executors sleep for whatever `Backoff::next_delay` returns and
//! give up when it returns `None`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Shape of the backoff curve
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// `minimum * multiplier^(n-1)`, capped at the maximum window
    Exponential,
    /// Uniform between the minimum window and the exponential window
    #[default]
    ExponentialSpread,
    /// `minimum * n`, capped at the maximum window
    Linear,
    /// Always the minimum window
    Fixed,
}

/// Invalid retry policy settings
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryPolicyError {
    #[error("minimum window {min:?} exceeds maximum window {max:?}")]
    WindowOrder { min: Duration, max: Duration },
    #[error("jitter must be within [0, 1], got {0}")]
    Jitter(f64),
    #[error("multiplier must be at least 1, got {0}")]
    Multiplier(f64),
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("retry policy needs max_attempts or max_elapsed")]
    Unbounded,
}

/// Backoff and budget configuration for remote operations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub kind: BackoffKind,
    #[serde(with = "humantime_serde")]
    pub minimum_window: Duration,
    #[serde(with = "humantime_serde")]
    pub maximum_window: Duration,
    pub multiplier: f64,
    /// Fraction in `[0, 1]` by which each delay may be randomly shortened
    pub jitter: f64,
    /// Total attempts, including the first one
    pub max_attempts: Option<u32>,
    #[serde(with = "humantime_serde")]
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            kind: BackoffKind::ExponentialSpread,
            minimum_window: Duration::from_millis(1),
            maximum_window: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 1.0,
            max_attempts: Some(10),
            max_elapsed: None,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            kind: BackoffKind::Fixed,
            minimum_window: Duration::ZERO,
            maximum_window: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
            max_attempts: Some(1),
            max_elapsed: None,
        }
    }

    /// Fixed delay between a bounded number of attempts
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            minimum_window: delay,
            maximum_window: delay,
            multiplier: 1.0,
            jitter: 0.0,
            max_attempts: Some(max_attempts),
            max_elapsed: None,
        }
    }

    pub fn with_kind(mut self, kind: BackoffKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_windows(mut self, minimum: Duration, maximum: Duration) -> Self {
        self.minimum_window = minimum;
        self.maximum_window = maximum;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_max_elapsed(mut self, elapsed: Option<Duration>) -> Self {
        self.max_elapsed = elapsed;
        self
    }

    pub fn validate(&self) -> Result<(), RetryPolicyError> {
        if self.minimum_window > self.maximum_window {
            return Err(RetryPolicyError::WindowOrder {
                min: self.minimum_window,
                max: self.maximum_window,
            });
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(RetryPolicyError::Jitter(self.jitter));
        }
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(RetryPolicyError::Multiplier(self.multiplier));
        }
        match (self.max_attempts, self.max_elapsed) {
            (Some(0), _) => Err(RetryPolicyError::ZeroAttempts),
            (None, None) => Err(RetryPolicyError::Unbounded),
            _ => Ok(()),
        }
    }

    /// Upper bound of the delay after the `failures`-th failed attempt (1-based)
    pub fn window(&self, failures: u32) -> Duration {
        let n = failures.max(1);
        let min = self.minimum_window;
        let window = match self.kind {
            BackoffKind::Fixed => min,
            BackoffKind::Linear => min.saturating_mul(n),
            BackoffKind::Exponential | BackoffKind::ExponentialSpread => {
                let exponent = i32::try_from(n - 1).unwrap_or(i32::MAX);
                let factor = self.multiplier.powi(exponent);
                Duration::try_from_secs_f64(min.as_secs_f64() * factor)
                    .unwrap_or(self.maximum_window)
            }
        };
        window.min(self.maximum_window)
    }

    /// Randomized delay after the `failures`-th failed attempt
    pub fn delay(&self, failures: u32, rng: &mut impl Rng) -> Duration {
        let window = self.window(failures);
        let base = match self.kind {
            BackoffKind::ExponentialSpread if window > self.minimum_window => {
                let spread = (window - self.minimum_window).as_secs_f64();
                self.minimum_window + Duration::from_secs_f64(spread * rng.random::<f64>())
            }
            _ => window,
        };
        if self.jitter <= 0.0 {
            return base;
        }
        let shrink = self.jitter * rng.random::<f64>();
        base.mul_f64(1.0 - shrink)
    }
}

/// One operation's progress through a [`RetryPolicy`]
#[derive(Debug)]
pub struct Backoff<'a> {
    policy: &'a RetryPolicy,
    attempts: u32,
    started: Instant,
}

impl<'a> Backoff<'a> {
    pub fn start(policy: &'a RetryPolicy, now: Instant) -> Self {
        Self {
            policy,
            attempts: 0,
            started: now,
        }
    }

    /// Attempts recorded as failed so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Record a failed attempt and return how long to wait before the next one
    ///
    /// Returns `None` once the attempt cap or the elapsed budget is spent. The
    /// returned delay never overshoots the elapsed budget.
    pub fn next_delay(&mut self, now: Instant) -> Option<Duration> {
        self.attempts += 1;
        if let Some(max) = self.policy.max_attempts {
            if self.attempts >= max {
                return None;
            }
        }

        let delay = self.policy.delay(self.attempts, &mut rand::rng());
        match self.policy.max_elapsed {
            Some(budget) => {
                let elapsed = self.elapsed(now);
                if elapsed >= budget {
                    return None;
                }
                Some(delay.min(budget - elapsed))
            }
            None => Some(delay),
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
