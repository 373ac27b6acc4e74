//! In-memory outcome tracking
//!
//! [`StatusStore`] keeps the last outcome recorded per message id and
//! [`IdempotencyStore`] remembers which ids were delivered. Entries are never
//! removed for the lifetime of the process.

use courier_common::{DeliveryOutcome, NO_STATUS_FOUND};
use dashmap::{DashMap, DashSet};

/// Last recorded outcome per message id
#[derive(Debug, Default)]
pub struct StatusStore {
    statuses: DashMap<String, DeliveryOutcome>,
}

impl StatusStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `outcome` for `id`, replacing any earlier entry
    pub fn record(&self, id: &str, outcome: DeliveryOutcome) {
        self.statuses.insert(id.to_string(), outcome);
    }

    /// The recorded outcome, if any
    pub fn status(&self, id: &str) -> Option<DeliveryOutcome> {
        self.statuses.get(id).map(|entry| entry.value().clone())
    }

    /// The recorded outcome as a status string, or [`NO_STATUS_FOUND`]
    pub fn get_status(&self, id: &str) -> String {
        self.statuses
            .get(id)
            .map_or_else(|| NO_STATUS_FOUND.to_string(), |entry| entry.to_string())
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

/// Ids whose send completed with a provider success
#[derive(Debug, Default)]
pub struct IdempotencyStore {
    sent: DashSet<String>,
}

impl IdempotencyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as delivered. The caller records the success in the
    /// [`StatusStore`] first.
    pub fn mark_sent(&self, id: &str) {
        self.sent.insert(id.to_string());
    }

    pub fn is_already_sent(&self, id: &str) -> bool {
        self.sent.contains(id)
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}
