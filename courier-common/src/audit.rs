//! Audit logging for message dispatch events
//!
//! Structured events for every stage a message passes through, with optional
//! redaction of the recipient address.
//!
//! ## Audit Events
//!
//! - `MessageSubmitted`: A message entered `send_message`
//! - `ProviderAttempt`: A single attempt against one provider
//! - `DeliverySuccess`: A provider accepted the message
//! - `DeliveryFailure`: Every provider exhausted its retries
//! - `DeliveryRejected`: The rate limiter or circuit breaker refused the message

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Audit logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging for dispatch events
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Redact the local part of recipient addresses
    #[serde(default)]
    pub redact_recipients: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_recipients: false,
        }
    }
}

const fn default_true() -> bool {
    true
}

static AUDIT_CONFIG: std::sync::OnceLock<Arc<AuditConfig>> = std::sync::OnceLock::new();

/// Initialize audit logging with configuration
pub fn init(config: AuditConfig) {
    AUDIT_CONFIG.get_or_init(|| Arc::new(config));
}

/// Get the current audit configuration
#[must_use]
pub fn config() -> Arc<AuditConfig> {
    AUDIT_CONFIG
        .get()
        .cloned()
        .unwrap_or_else(|| Arc::new(AuditConfig::default()))
}

/// Redact email address if redaction is enabled
#[must_use]
pub fn redact_email(email: &str, redact: bool) -> String {
    if redact {
        // Keep domain but redact local part
        if let Some((_, domain)) = email.split_once('@') {
            format!("[REDACTED]@{domain}")
        } else {
            "[REDACTED]".to_string()
        }
    } else {
        email.to_string()
    }
}

/// Log message submitted event
pub fn log_message_submitted(message_id: &str, recipient: &str) {
    let config = config();
    if !config.enabled {
        return;
    }

    let recipient = redact_email(recipient, config.redact_recipients);

    tracing::event!(
        tracing::Level::INFO,
        event = "MessageSubmitted",
        message_id = %message_id,
        recipient = %recipient,
        "Audit: Message submitted"
    );
}

/// Log a single provider attempt
///
/// # Fields
/// - `message_id`: Caller assigned message identifier
/// - `provider`: Provider name
/// - `attempt`: Attempt number against this provider (1-based)
pub fn log_provider_attempt(message_id: &str, provider: &str, attempt: u32) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::DEBUG,
        event = "ProviderAttempt",
        message_id = %message_id,
        provider = %provider,
        attempt = attempt,
        "Audit: Provider attempt"
    );
}

/// Log delivery success event
pub fn log_delivery_success(message_id: &str, provider: &str, attempts: u32, duration_ms: u128) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "DeliverySuccess",
        message_id = %message_id,
        provider = %provider,
        total_attempts = attempts,
        duration_ms = duration_ms,
        "Audit: Delivery successful"
    );
}

/// Log delivery failure event, after every provider has been exhausted
pub fn log_delivery_failure(message_id: &str, attempts: u32, duration_ms: u128) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::WARN,
        event = "DeliveryFailure",
        message_id = %message_id,
        total_attempts = attempts,
        duration_ms = duration_ms,
        "Audit: Delivery failed"
    );
}

/// Log a policy rejection (rate limit or open circuit)
pub fn log_delivery_rejected(message_id: &str, status: &str) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::WARN,
        event = "DeliveryRejected",
        message_id = %message_id,
        status = %status,
        "Audit: Delivery rejected"
    );
}
