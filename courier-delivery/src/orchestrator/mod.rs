//! Delivery orchestration
//!
//! [`DeliveryOrchestrator`] owns every piece of shared state (breaker, rate
//! window, status and idempotency stores) and drives a message through the
//! gates and the provider chain.
//!
//! ## Send Stages
//!
//! 1. **Circuit Breaker**: reject while the circuit is open, recording the
//!    rejection for the id even if it was delivered earlier
//! 2. **Idempotency**: an id that was already delivered returns its recorded
//!    outcome without reaching the rate limiter or a provider
//! 3. **Rate Limit**: reject when the sliding window is full, otherwise
//!    reserve a slot
//! 4. **Attempt Sequence**: retry each provider with backoff, falling through
//!    the chain in priority order
//! 5. **Finalization**: record the outcome, update the breaker, mark delivered
//!    ids as sent

mod attempt;

use std::sync::Arc;

use courier_common::{
    DeliveryOutcome, Message, audit, internal,
    tracing::{self, info},
};

use crate::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig},
    clock::{Clock, SystemClock},
    config::{DeliveryConfig, validate_providers},
    error::ConfigError,
    policy::RetryPolicy,
    provider::Provider,
    rate_limiter::{RateLimitConfig, RateLimiter},
    store::{IdempotencyStore, StatusStore},
};

/// Composition root for one independent delivery engine
#[derive(Debug)]
pub struct DeliveryOrchestrator {
    providers: Vec<Arc<dyn Provider>>,
    retry_policy: RetryPolicy,
    circuit_breaker: CircuitBreaker,
    rate_limiter: RateLimiter,
    statuses: StatusStore,
    sent: IdempotencyStore,
    clock: Arc<dyn Clock>,
}

impl DeliveryOrchestrator {
    /// Create a builder for the orchestrator
    pub fn builder() -> DeliveryOrchestratorBuilder {
        DeliveryOrchestratorBuilder::default()
    }

    /// Orchestrator using the simulated providers named in `config` and the
    /// system clock
    pub fn from_config(config: DeliveryConfig) -> Result<Self, ConfigError> {
        let providers = config.simulated_providers();
        Self::builder().config(config).providers(providers).build()
    }

    /// Deliver `message`, returning its outcome.
    ///
    /// Never fails: provider errors are retried and folded into the returned
    /// [`DeliveryOutcome`].
    #[tracing::instrument(level = "debug", skip_all, fields(message_id = %message.id))]
    pub async fn send_message(&self, message: &Message) -> DeliveryOutcome {
        audit::log_message_submitted(&message.id, &message.recipient);

        if !self.circuit_breaker.can_proceed() {
            return self.reject(message, DeliveryOutcome::CircuitOpen);
        }

        if let Some(outcome) = self.previously_delivered(&message.id) {
            info!(
                message_id = %message.id,
                status = %outcome,
                "Duplicate send prevented"
            );
            return outcome;
        }

        if let Err(wait_time) = self.rate_limiter.try_acquire() {
            internal!(
                level = DEBUG,
                "Rejecting {} for {}ms until the rate window frees up",
                message.id,
                wait_time.as_millis()
            );
            return self.reject(message, DeliveryOutcome::RateLimited);
        }

        let outcome = self.attempt_delivery(message).await;
        self.finalize(message, &outcome);

        outcome
    }

    /// The recorded status string for `id`, or `"No status found"`
    pub fn get_status(&self, id: &str) -> String {
        self.statuses.get_status(id)
    }

    /// The recorded outcome for `id`, if any
    pub fn status(&self, id: &str) -> Option<DeliveryOutcome> {
        self.statuses.status(id)
    }

    /// Check if `id` was delivered by an earlier send
    pub fn is_already_sent(&self, id: &str) -> bool {
        self.sent.is_already_sent(id)
    }

    pub const fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub const fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Providers in priority order
    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    pub(crate) const fn statuses(&self) -> &StatusStore {
        &self.statuses
    }

    fn previously_delivered(&self, id: &str) -> Option<DeliveryOutcome> {
        if !self.sent.is_already_sent(id) {
            return None;
        }

        self.statuses.status(id)
    }

    /// Record a policy rejection. Breaker and rate window are left alone.
    fn reject(&self, message: &Message, outcome: DeliveryOutcome) -> DeliveryOutcome {
        let status = outcome.to_string();
        audit::log_delivery_rejected(&message.id, &status);
        self.statuses.record(&message.id, outcome.clone());

        outcome
    }

    fn finalize(&self, message: &Message, outcome: &DeliveryOutcome) {
        self.statuses.record(&message.id, outcome.clone());

        if outcome.counts_as_failure() {
            if self.circuit_breaker.record_failure() {
                internal!(
                    level = WARN,
                    "Circuit opened after {} exhausted every provider",
                    message.id
                );
            }
        } else {
            self.circuit_breaker.reset();
        }

        // Status first, so a sent id always has a recorded outcome
        if outcome.is_delivered() {
            self.sent.mark_sent(&message.id);
        }
    }
}

/// Builder for [`DeliveryOrchestrator`]
#[derive(Debug, Default)]
pub struct DeliveryOrchestratorBuilder {
    circuit_breaker: CircuitBreakerConfig,
    rate_limit: RateLimitConfig,
    retry: RetryPolicy,
    providers: Vec<Arc<dyn Provider>>,
    clock: Option<Arc<dyn Clock>>,
}

impl DeliveryOrchestratorBuilder {
    /// Take the breaker, rate limit and retry settings from `config`.
    /// `config.providers` is ignored; providers are added explicitly.
    #[must_use]
    pub fn config(mut self, config: DeliveryConfig) -> Self {
        self.circuit_breaker = config.circuit_breaker;
        self.rate_limit = config.rate_limit;
        self.retry = config.retry;
        self
    }

    #[must_use]
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    #[must_use]
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Append a provider at the lowest priority so far
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    #[must_use]
    pub fn providers(mut self, providers: impl IntoIterator<Item = Arc<dyn Provider>>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Defaults to [`SystemClock`]
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the settings and build the orchestrator
    pub fn build(self) -> Result<DeliveryOrchestrator, ConfigError> {
        let config = DeliveryConfig {
            circuit_breaker: self.circuit_breaker,
            rate_limit: self.rate_limit,
            retry: self.retry,
            providers: Vec::new(),
        };
        config.validate()?;
        validate_providers(&self.providers)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        internal!(
            "Initialising delivery orchestrator with {} provider(s), rate limit {}/{}ms, breaker threshold {}",
            self.providers.len(),
            config.rate_limit.limit,
            config.rate_limit.interval_ms,
            config.circuit_breaker.failure_threshold
        );

        Ok(DeliveryOrchestrator {
            providers: self.providers,
            retry_policy: config.retry,
            circuit_breaker: CircuitBreaker::new(config.circuit_breaker, clock.clone()),
            rate_limiter: RateLimiter::new(config.rate_limit, clock.clone()),
            statuses: StatusStore::new(),
            sent: IdempotencyStore::new(),
            clock,
        })
    }
}
