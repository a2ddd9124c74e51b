// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Retry Policy - Exponential Backoff for Connector Calls
//
// Invocation `i` (0-based) that fails is followed by a sleep of
// `base_delay * 2^i` before invocation `i + 1`. The delay is not capped;
// arithmetic saturates instead of overflowing. Every error is retried.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of invocations per logical request
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay between invocations in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total invocations; 0 behaves like 1 (no retry)
    pub attempts: u32,

    /// Base of the exponential backoff
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_millis(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS)
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    pub fn from_millis(attempts: u32, delay_ms: u64) -> Self {
        Self::new(attempts, Duration::from_millis(delay_ms))
    }

    /// Sleep inserted after the failed invocation with index `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `operation` with this policy's attempt count
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_with(self.attempts, operation).await
    }

    /// Run `operation` up to `attempts` times, returning the first success or
    /// the error of the final invocation unmodified
    pub async fn execute_with<F, Fut, T, E>(&self, attempts: u32, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let total = attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("Operation succeeded on attempt {}/{}", attempt + 1, total);
                    }
                    return Ok(value);
                }
                Err(e) if attempt + 1 < total => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt + 1,
                        total,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
