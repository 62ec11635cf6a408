//! Retry delays and error classification
//!
//! Render and download retries share one backoff formula:
//! `min(base * 2^attempt, max)` plus a random jitter of up to
//! `jitter_percent` percent of that delay.

use crate::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Errors that can be classified as transient or permanent
pub trait IsRetryable {
    /// Returns true if the operation should be attempted again
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base_ms: u64,
    max_ms: u64,
    jitter_percent: u64,
}

impl ExponentialBackoff {
    pub const fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            jitter_percent: 10,
        }
    }

    pub fn with_jitter(mut self, jitter_percent: u64) -> Self {
        self.jitter_percent = jitter_percent;
        self
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.base_delay_ms, config.max_delay_ms).with_jitter(config.jitter_percent)
    }

    /// The capped exponential delay without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponential_delay = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(attempt.min(20)));
        Duration::from_millis(exponential_delay.min(self.max_ms))
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let capped_delay = self.base_delay(attempt).as_millis() as u64;
        let max_jitter = capped_delay.saturating_mul(self.jitter_percent.min(100)) / 100;
        let jitter = if max_jitter > 0 {
            rand::thread_rng().gen_range(0..=max_jitter)
        } else {
            0
        };
        Duration::from_millis(capped_delay + jitter)
    }
}
