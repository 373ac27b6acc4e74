use core::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Returned by status lookups for an identifier that has never been seen
pub const NO_STATUS_FOUND: &str = "No status found";

/// Terminal result of a single `send_message` call.
///
/// The [`Display`] form is the status string handed back to callers and is
/// part of the external contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryOutcome {
    /// A provider accepted the message
    Delivered { provider: String },
    /// Every provider exhausted its retries
    Failed,
    /// Rejected by the sliding window before any attempt was made
    RateLimited,
    /// Rejected because the circuit breaker is open
    CircuitOpen,
}

impl DeliveryOutcome {
    pub fn delivered(provider: impl Into<String>) -> Self {
        Self::Delivered {
            provider: provider.into(),
        }
    }

    /// Checks if a provider accepted the message
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// Only exhaustion counts against provider health
    pub const fn counts_as_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl Display for DeliveryOutcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered { provider } => write!(fmt, "{provider} success"),
            Self::Failed => fmt.write_str("Failed"),
            Self::RateLimited => fmt.write_str("Failed - Rate Limit"),
            Self::CircuitOpen => fmt.write_str("Failed - Circuit Open"),
        }
    }
}
