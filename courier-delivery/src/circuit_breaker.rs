//! Circuit breaker guarding the whole provider chain
//!
//! Counts consecutive exhausted sends (not individual retries). Once the count
//! reaches the threshold the circuit opens and every send is rejected until the
//! recovery interval has passed since the last failure.
//!
//! # State Transitions
//!
//! ```text
//! ┌─────────┐  failure_threshold consecutive failures  ┌──────┐
//! │ Closed  │ ───────────────────────────────────────> │ Open │
//! └─────────┘                                          └──────┘
//!     ^                                                   │
//!     │   recovery interval elapsed (checked on the next  │
//!     │   can_proceed call, which lets that send through) │
//!     └───────────────────────────────────────────────────┘
//! ```
//!
//! A send that ends in a provider success calls [`CircuitBreaker::reset`],
//! which clears the counter and forces the circuit closed. Sends rejected by a
//! gate leave the breaker untouched.
//!
//! # Example
//!
//! ```text
//! Threshold: 3 failures, recovery: 30 seconds
//!
//! t=0s:   Closed
//! t=5s:   3rd consecutive Failed outcome -> Open
//! t=5s-35s: can_proceed() == false
//! t=36s:  can_proceed() == true, counter reset, Closed again
//! ```

use std::{fmt, sync::Arc, time::Duration};

use courier_common::tracing;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{sync::broadcast, time::Instant};

use crate::clock::Clock;

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed sends required to open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long after the last failure the circuit stays open (milliseconds)
    #[serde(default = "default_recovery_interval_ms")]
    pub recovery_interval_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_interval_ms: default_recovery_interval_ms(),
        }
    }
}

impl CircuitBreakerConfig {
    pub const fn recovery_interval(&self) -> Duration {
        Duration::from_millis(self.recovery_interval_ms)
    }
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_recovery_interval_ms() -> u64 {
    30_000
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - sends allowed
    Closed,
    /// Tripped - sends rejected until the recovery interval passes
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
        }
    }
}

/// Transitions published to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitEvent {
    /// The circuit tripped after `consecutive_failures` failed sends
    Opened { consecutive_failures: u32 },
    /// The recovery interval passed and a trial send was let through
    Recovered,
}

#[derive(Debug)]
struct CircuitBreakerData {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

impl CircuitBreakerData {
    const fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }

    fn is_recovery_elapsed(&self, now: Instant, recovery: Duration) -> bool {
        self.last_failure_at
            .is_none_or(|last_failure| now.duration_since(last_failure) > recovery)
    }

    /// Returns the event to publish, if the check closed the circuit
    fn can_proceed(&mut self, now: Instant, recovery: Duration) -> (bool, Option<CircuitEvent>) {
        match self.state {
            CircuitState::Closed => (true, None),
            CircuitState::Open if self.is_recovery_elapsed(now, recovery) => {
                self.state = CircuitState::Closed;
                self.consecutive_failures = 0;
                (true, Some(CircuitEvent::Recovered))
            }
            CircuitState::Open => (false, None),
        }
    }

    fn record_failure(&mut self, now: Instant, threshold: u32) -> Option<CircuitEvent> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(now);

        if self.state == CircuitState::Closed && self.consecutive_failures >= threshold {
            self.state = CircuitState::Open;
            Some(CircuitEvent::Opened {
                consecutive_failures: self.consecutive_failures,
            })
        } else {
            None
        }
    }

    /// Returns `true` if the circuit was open
    fn reset(&mut self) -> bool {
        let was_open = self.state == CircuitState::Open;
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        was_open
    }
}

/// Process wide circuit breaker for one orchestrator
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    data: Mutex<CircuitBreakerData>,
    events: broadcast::Sender<CircuitEvent>,
}

impl CircuitBreaker {
    /// Create a new, closed circuit breaker
    #[must_use]
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            config,
            clock,
            data: Mutex::new(CircuitBreakerData::new()),
            events,
        }
    }

    /// Receive [`CircuitEvent`]s from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CircuitEvent> {
        self.events.subscribe()
    }

    /// Check if a send may start.
    ///
    /// When the circuit is open and the recovery interval has passed, this
    /// call closes it and resets the failure counter, so the caller's send acts
    /// as the trial.
    pub fn can_proceed(&self) -> bool {
        let now = self.clock.now();
        let (allowed, event) = self
            .data
            .lock()
            .can_proceed(now, self.config.recovery_interval());

        if let Some(event) = event {
            tracing::info!(
                recovery_interval_ms = self.config.recovery_interval_ms,
                "Circuit breaker CLOSED - recovery interval elapsed, allowing trial send"
            );
            self.publish(event);
        }

        allowed
    }

    /// Record a send that exhausted every provider
    ///
    /// Returns `true` if this failure opened the circuit
    pub fn record_failure(&self) -> bool {
        let now = self.clock.now();
        let event = self
            .data
            .lock()
            .record_failure(now, self.config.failure_threshold);

        let Some(event) = event else {
            return false;
        };

        if let CircuitEvent::Opened {
            consecutive_failures,
        } = event
        {
            tracing::warn!(
                consecutive_failures,
                threshold = self.config.failure_threshold,
                recovery_interval_ms = self.config.recovery_interval_ms,
                "Circuit breaker OPENED - rejecting sends until providers recover"
            );
        }
        self.publish(event);

        true
    }

    /// Clear the failure counter and close the circuit
    ///
    /// Returns `true` if the circuit was open
    pub fn reset(&self) -> bool {
        let was_open = self.data.lock().reset();
        if was_open {
            tracing::info!("Circuit breaker CLOSED by reset");
        }
        was_open
    }

    pub fn state(&self) -> CircuitState {
        self.data.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.data.lock().consecutive_failures
    }

    /// Snapshot for monitoring
    pub fn stats(&self) -> CircuitBreakerStats {
        let data = self.data.lock();
        CircuitBreakerStats {
            state: data.state,
            consecutive_failures: data.consecutive_failures,
            since_last_failure: data
                .last_failure_at
                .map(|at| self.clock.now().duration_since(at)),
        }
    }

    fn publish(&self, event: CircuitEvent) {
        // No subscribers is the common case
        let _ = self.events.send(event);
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub since_last_failure: Option<Duration>,
}
