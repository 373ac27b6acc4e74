//! Delivery engine configuration
//!
//! Every field has a default, so an empty RON tuple `()` is a complete
//! configuration:
//!
//! ```ron
//! (
//!     circuit_breaker: (failure_threshold: 3, recovery_interval_ms: 30000),
//!     rate_limit: (limit: 2, interval_ms: 1000),
//!     retry: (max_retries: 3, base_delay_ms: 100),
//!     providers: [
//!         (name: "Provider1", failure_rate: 0.5),
//!         (name: "Provider2", failure_rate: 0.5),
//!     ],
//! )
//! ```

use std::{collections::HashSet, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    circuit_breaker::CircuitBreakerConfig,
    error::ConfigError,
    policy::RetryPolicy,
    provider::{Provider, SimulatedProvider},
    rate_limiter::RateLimitConfig,
};

/// A simulated provider entry, in priority order within [`DeliveryConfig`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,

    /// Probability that a single attempt fails
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
}

const fn default_failure_rate() -> f64 {
    0.5
}

fn default_providers() -> Vec<ProviderConfig> {
    ["Provider1", "Provider2"]
        .into_iter()
        .map(|name| ProviderConfig {
            name: name.to_string(),
            failure_rate: default_failure_rate(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Providers to simulate, highest priority first
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryPolicy::default(),
            providers: default_providers(),
        }
    }
}

impl DeliveryConfig {
    /// Validate the engine settings. The provider list is validated separately
    /// by the orchestrator builder, since providers may be injected instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "circuit_breaker.failure_threshold",
                "must be greater than 0",
            ));
        }

        if self.rate_limit.limit == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.limit",
                "must be greater than 0",
            ));
        }

        if self.rate_limit.interval_ms == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.interval_ms",
                "must be greater than 0",
            ));
        }

        self.retry.validate()?;

        for provider in &self.providers {
            if !(0.0..=1.0).contains(&provider.failure_rate) {
                return Err(ConfigError::invalid(
                    "providers.failure_rate",
                    format!(
                        "{} for {} is outside 0.0..=1.0",
                        provider.failure_rate, provider.name
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Build the configured simulated providers, in priority order
    pub fn simulated_providers(&self) -> Vec<Arc<dyn Provider>> {
        self.providers
            .iter()
            .map(|provider| {
                Arc::new(SimulatedProvider::new(&provider.name, provider.failure_rate))
                    as Arc<dyn Provider>
            })
            .collect()
    }
}

/// Reject an empty chain, blank names and duplicate names
pub(crate) fn validate_providers(providers: &[Arc<dyn Provider>]) -> Result<(), ConfigError> {
    if providers.is_empty() {
        return Err(ConfigError::NoProviders);
    }

    let mut seen = HashSet::with_capacity(providers.len());
    for provider in providers {
        let name = provider.name();
        if name.trim().is_empty() {
            return Err(ConfigError::invalid("providers.name", "must not be blank"));
        }
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateProvider(name.to_string()));
        }
    }

    Ok(())
}
