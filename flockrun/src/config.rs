//! Run configuration: concurrency, retry counts, and pause ranges.
//!
//! Configuration is built once at startup and passed explicitly into the
//! scheduler; there is no process-wide config singleton.

use crate::errors::EngineError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An inclusive range of pause durations in milliseconds.
///
/// Sampling draws uniformly from `[min_ms, max_ms]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseRange {
    /// Lower bound in milliseconds.
    pub min_ms: u64,
    /// Upper bound in milliseconds.
    pub max_ms: u64,
}

impl PauseRange {
    /// Creates a new pause range. Reversed bounds are swapped.
    #[must_use]
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        if min_ms <= max_ms {
            Self { min_ms, max_ms }
        } else {
            Self {
                min_ms: max_ms,
                max_ms: min_ms,
            }
        }
    }

    /// A zero-length pause range (no sleep).
    #[must_use]
    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    /// Samples a duration uniformly from the range.
    ///
    /// Reversed bounds (possible via deserialized or directly-built values
    /// that bypassed [`PauseRange::new`]) are treated as swapped.
    #[must_use]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let lo = self.min_ms.min(self.max_ms);
        let hi = self.min_ms.max(self.max_ms);
        let ms = if lo == hi { lo } else { rng.gen_range(lo..=hi) };
        Duration::from_millis(ms)
    }

    /// Returns true if the range can only produce a zero-length pause.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.min_ms.max(self.max_ms) == 0
    }
}

impl Default for PauseRange {
    fn default() -> Self {
        Self {
            min_ms: 1_000,
            max_ms: 5_000,
        }
    }
}

/// Configuration for the per-step retry policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per step (including the first).
    pub attempts: usize,
    /// Pause range between attempts.
    pub pause: PauseRange,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            pause: PauseRange::new(2_000, 10_000),
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts. Zero is normalized to one.
    #[must_use]
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Sets the inter-attempt pause range.
    #[must_use]
    pub fn with_pause(mut self, pause: PauseRange) -> Self {
        self.pause = pause;
        self
    }
}

/// Top-level configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum number of account pipelines running at once.
    pub concurrency: usize,
    /// Retry policy applied to every plan step.
    pub retry: RetryConfig,
    /// Pause inserted after account setup and after the last step.
    pub account_pause: PauseRange,
    /// Pause inserted between consecutive plan steps.
    pub step_pause: PauseRange,
    /// Whether account launch order is shuffled. Tests pin it to false.
    pub shuffle_accounts: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            retry: RetryConfig::default(),
            account_pause: PauseRange::new(5_000, 30_000),
            step_pause: PauseRange::new(5_000, 30_000),
            shuffle_accounts: true,
        }
    }
}

impl RunConfig {
    /// Creates a new run config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency limit.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the retry config.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the account-level pause range.
    #[must_use]
    pub fn with_account_pause(mut self, pause: PauseRange) -> Self {
        self.account_pause = pause;
        self
    }

    /// Sets the between-steps pause range.
    #[must_use]
    pub fn with_step_pause(mut self, pause: PauseRange) -> Self {
        self.step_pause = pause;
        self
    }

    /// Disables launch-order shuffling.
    #[must_use]
    pub fn without_shuffle(mut self) -> Self {
        self.shuffle_accounts = false;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the concurrency limit is zero.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.concurrency == 0 {
            return Err(EngineError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
