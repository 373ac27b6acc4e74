//! Typed errors for delivery operations.
//!
//! Provider failures are expected and never leave the orchestrator: they only
//! decide which [`courier_common::DeliveryOutcome`] is returned. Configuration
//! errors are the only errors a caller of this crate sees.

use thiserror::Error;

/// A single provider attempt failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached or timed out.
    #[error("{provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },
}

impl ProviderError {
    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// Invalid orchestrator configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// No provider was configured.
    #[error("At least one provider is required")]
    NoProviders,

    /// Two providers share a name, which would make their outcomes ambiguous.
    #[error("Duplicate provider name: {0}")]
    DuplicateProvider(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
