//! Sliding window rate limiting for send attempts
//!
//! Unlike a token bucket there is no smoothing: at most `limit` attempt
//! sequences may start within any trailing `interval`, whatever their result.
//!
//! # Example
//!
//! ```text
//! limit: 2, interval: 1000ms
//!
//! t=0ms:    admit (window: [0])
//! t=10ms:   admit (window: [0, 10])
//! t=20ms:   reject, retry in 980ms
//! t=1000ms: 0 leaves the window, admit (window: [10, 1000])
//! ```

use std::{collections::VecDeque, sync::Arc, time::Duration};

use courier_common::tracing;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::clock::Clock;

/// Configuration for rate limiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum attempt sequences started within one interval
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Length of the trailing window (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl RateLimitConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

const fn default_limit() -> usize {
    2
}

const fn default_interval_ms() -> u64 {
    1_000
}

/// Attempt start instants, oldest first
#[derive(Debug)]
struct SlidingWindow {
    starts: VecDeque<Instant>,
    limit: usize,
    interval: Duration,
}

impl SlidingWindow {
    fn new(limit: usize, interval: Duration) -> Self {
        Self {
            starts: VecDeque::with_capacity(limit),
            limit,
            interval,
        }
    }

    /// Drop every start that is `interval` or more in the past
    fn prune(&mut self, now: Instant) {
        while self
            .starts
            .front()
            .is_some_and(|start| now.duration_since(*start) >= self.interval)
        {
            self.starts.pop_front();
        }
    }

    /// Prune, then admit and record `now` if there is room
    fn try_admit(&mut self, now: Instant) -> Result<(), Duration> {
        self.prune(now);

        if self.starts.len() < self.limit {
            self.starts.push_back(now);
            return Ok(());
        }

        Err(self.time_until_available(now))
    }

    fn time_until_available(&self, now: Instant) -> Duration {
        self.starts.front().map_or(self.interval, |oldest| {
            self.interval.saturating_sub(now.duration_since(*oldest))
        })
    }
}

/// Rate limiter shared by every send on one orchestrator
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    window: Mutex<SlidingWindow>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration
    #[must_use]
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let window = SlidingWindow::new(config.limit, config.interval());
        Self {
            config,
            clock,
            window: Mutex::new(window),
        }
    }

    /// Try to reserve a slot for an attempt sequence starting now.
    ///
    /// The slot is counted immediately, before the attempt completes.
    ///
    /// Returns `Ok(())` if admitted, `Err(Duration)` with the time until the
    /// oldest start leaves the window if not
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = self.clock.now();
        let result = self.window.lock().try_admit(now);

        if let Err(wait_time) = result {
            tracing::debug!(
                limit = self.config.limit,
                interval_ms = self.config.interval_ms,
                wait_ms = wait_time.as_millis(),
                "Rate limit exceeded"
            );
        }

        result
    }

    /// Current stats, after pruning expired starts
    pub fn stats(&self) -> RateLimitStats {
        let now = self.clock.now();
        let mut window = self.window.lock();
        window.prune(now);

        RateLimitStats {
            in_window: window.starts.len(),
            limit: window.limit,
            interval: window.interval,
        }
    }
}

/// Statistics for the rate limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStats {
    /// Attempt sequences started within the trailing interval
    pub in_window: usize,
    pub limit: usize,
    pub interval: Duration,
}
