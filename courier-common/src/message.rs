use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// A single logical message submitted for delivery.
///
/// The `id` is assigned by the caller and identifies the logical send: two
/// submissions carrying the same `id` are the same message as far as
/// idempotency is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(alias = "to")]
    pub recipient: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Presence checks performed at the boundary before a message reaches the
    /// delivery engine. The engine itself never calls this.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::MissingField`] when `id` or `recipient` is blank.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.id.trim().is_empty() {
            return Err(InputError::MissingField("id"));
        }

        if self.recipient.trim().is_empty() {
            return Err(InputError::MissingField("recipient"));
        }

        Ok(())
    }
}
