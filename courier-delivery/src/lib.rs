//! Reliable dispatch of outbound messages across a chain of providers
//!
//! This crate provides:
//! - A circuit breaker that stops sending after repeated exhausted deliveries
//! - A sliding window rate limiter for admission
//! - Per-provider retry with exponential backoff and ordered fallback
//! - Idempotency for ids that were already delivered
//! - Status tracking for every submitted id

mod circuit_breaker;
mod clock;
mod config;
mod error;
mod orchestrator;
pub mod policy;
mod provider;
mod rate_limiter;
mod service;
mod store;

// Re-export reliability primitives
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitEvent, CircuitState,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DeliveryConfig, ProviderConfig};
// Re-export common types
pub use courier_common::{DeliveryOutcome, Message, NO_STATUS_FOUND};
// Re-export error types
pub use error::{ConfigError, ProviderError};
// Re-export core types
pub use orchestrator::{DeliveryOrchestrator, DeliveryOrchestratorBuilder};
pub use policy::RetryPolicy;
pub use provider::{Provider, ScriptedProvider, SimulatedProvider};
pub use rate_limiter::{RateLimitConfig, RateLimitStats, RateLimiter};
pub use service::DeliveryQueryService;
pub use store::{IdempotencyStore, StatusStore};
