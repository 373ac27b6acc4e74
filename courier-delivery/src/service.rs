//! Service trait abstraction for delivery queries
//!
//! Callers that only report on delivery state (status commands, health
//! checks) depend on [`DeliveryQueryService`] rather than the concrete
//! [`DeliveryOrchestrator`].

use courier_common::DeliveryOutcome;

use crate::{
    circuit_breaker::CircuitBreakerStats, orchestrator::DeliveryOrchestrator,
    rate_limiter::RateLimitStats,
};

/// Read-only view of delivery state
///
/// None of these methods change breaker or store state.
///
/// # Example
///
/// ```rust,ignore
/// fn report(service: &dyn DeliveryQueryService, id: &str) -> String {
///     format!("{id}: {}", service.get_status(id))
/// }
/// ```
pub trait DeliveryQueryService: Send + Sync {
    /// The status string recorded for `id`, or `"No status found"`
    fn get_status(&self, id: &str) -> String;

    /// The recorded outcome for `id`, if any
    fn status(&self, id: &str) -> Option<DeliveryOutcome>;

    /// Number of distinct ids with a recorded status
    fn tracked_messages(&self) -> usize;

    /// Snapshot of the circuit breaker
    fn circuit_breaker_stats(&self) -> CircuitBreakerStats;

    /// Snapshot of the rate window, counting only unexpired admissions
    fn rate_limit_stats(&self) -> RateLimitStats;
}

impl DeliveryQueryService for DeliveryOrchestrator {
    fn get_status(&self, id: &str) -> String {
        Self::get_status(self, id)
    }

    fn status(&self, id: &str) -> Option<DeliveryOutcome> {
        Self::status(self, id)
    }

    fn tracked_messages(&self) -> usize {
        self.statuses().len()
    }

    fn circuit_breaker_stats(&self) -> CircuitBreakerStats {
        self.circuit_breaker().stats()
    }

    fn rate_limit_stats(&self) -> RateLimitStats {
        self.rate_limiter().stats()
    }
}
