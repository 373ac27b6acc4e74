//! Retry policy for provider attempts.
//!
//! Each provider in the chain gets `max_retries` attempts. After every failed
//! attempt, including the last one before falling through to the next
//! provider, the orchestrator sleeps for an exponentially growing delay. The
//! delay starts over at the base value for each provider.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Calculate the backoff delay after a failed attempt
///
/// # Formula
/// `delay = min(base * 2^(attempt - 1), max_delay) * (1 ± jitter)`
///
/// # Arguments
/// * `attempt` - The attempt number against the current provider (1-indexed)
/// * `base_delay_ms` - Delay after the first failure
/// * `max_delay_ms` - Upper bound before jitter
/// * `jitter_factor` - Jitter factor (e.g., 0.2 for ±20%, 0.0 for none)
pub fn calculate_backoff_delay(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let delay = if exponent >= 63 {
        max_delay_ms
    } else {
        let multiplier = 1u64 << exponent;
        base_delay_ms.saturating_mul(multiplier).min(max_delay_ms)
    };

    if jitter_factor <= 0.0 {
        return Duration::from_millis(delay);
    }

    // Intentional precision loss and casting for randomization
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let jittered_delay = {
        let jitter_range = (delay as f64) * jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        ((delay as f64) + jitter).max(0.0) as u64
    };

    Duration::from_millis(jittered_delay)
}

/// Retry policy configuration for provider attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per provider before falling through to the next one.
    ///
    /// Default: 3
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Delay after the first failed attempt against a provider (milliseconds).
    ///
    /// Default: 100
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap on a single backoff delay (milliseconds).
    ///
    /// Default: 30000
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    /// Randomize each delay within ±`jitter_factor`.
    ///
    /// Default: 0.0 (delays double exactly)
    #[serde(default)]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Check if another attempt against the same provider is allowed.
    #[must_use]
    pub const fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_retries
    }

    /// Delay to sleep after failed attempt number `attempt` (1-indexed)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff_delay(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_factor,
        )
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::invalid(
                "retry.max_retries",
                "must be greater than 0",
            ));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::invalid(
                "retry.max_delay_ms",
                format!(
                    "{} is smaller than base_delay_ms ({})",
                    self.max_delay_ms, self.base_delay_ms
                ),
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::invalid(
                "retry.jitter_factor",
                format!("{} is outside 0.0..=1.0", self.jitter_factor),
            ));
        }

        Ok(())
    }
}

mod defaults {
    pub const fn max_retries() -> u32 {
        3
    }

    pub const fn base_delay_ms() -> u64 {
        100
    }

    pub const fn max_delay_ms() -> u64 {
        30_000
    }
}
