//! Delivery providers
//!
//! A [`Provider`] makes exactly one delivery attempt per call. Retries,
//! backoff and fallback between providers belong to the orchestrator.

use std::{
    collections::VecDeque,
    fmt::Debug,
    sync::atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use courier_common::{Message, outgoing};
use parking_lot::Mutex;
use rand::Rng;

use crate::error::ProviderError;

#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Name used in the success outcome, e.g. `Provider1`
    fn name(&self) -> &str;

    /// Make a single delivery attempt
    async fn attempt(&self, message: &Message) -> Result<(), ProviderError>;
}

/// Stand-in for a real backend that fails at random.
#[derive(Debug)]
pub struct SimulatedProvider {
    name: String,
    failure_rate: f64,
}

impl SimulatedProvider {
    /// `failure_rate` is clamped to `0.0..=1.0`
    pub fn new(name: impl Into<String>, failure_rate: f64) -> Self {
        Self {
            name: name.into(),
            failure_rate: if failure_rate.is_nan() {
                0.0
            } else {
                failure_rate.clamp(0.0, 1.0)
            },
        }
    }
}

#[async_trait]
impl Provider for SimulatedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, message: &Message) -> Result<(), ProviderError> {
        outgoing!("[{}] Sending {} to {}", self.name, message.id, message.recipient);

        let failed = rand::rng().random_bool(self.failure_rate);
        if failed {
            Err(ProviderError::unavailable(&self.name, "simulated failure"))
        } else {
            Ok(())
        }
    }
}

/// Provider with a predetermined sequence of results.
///
/// Each attempt consumes the next scripted result; once the script runs out
/// every further attempt gets the fallback result. Attempts are counted.
#[derive(Debug)]
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    calls: AtomicU32,
}

impl ScriptedProvider {
    /// `true` entries succeed, `false` entries fail
    pub fn new(name: impl Into<String>, script: impl IntoIterator<Item = bool>, then: bool) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(script.into_iter().collect()),
            fallback: then,
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_succeed(name: impl Into<String>) -> Self {
        Self::new(name, std::iter::empty(), true)
    }

    pub fn always_fail(name: impl Into<String>) -> Self {
        Self::new(name, std::iter::empty(), false)
    }

    /// Fail `failures` times, then succeed
    pub fn fail_times(name: impl Into<String>, failures: usize) -> Self {
        Self::new(name, std::iter::repeat_n(false, failures), true)
    }

    /// Number of attempts made so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, message: &Message) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        outgoing!("[{}] Sending {} to {}", self.name, message.id, message.recipient);

        let succeeded = self.script.lock().pop_front().unwrap_or(self.fallback);
        if succeeded {
            Ok(())
        } else {
            Err(ProviderError::unavailable(&self.name, "scripted failure"))
        }
    }
}
