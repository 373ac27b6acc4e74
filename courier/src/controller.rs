use std::path::Path;

use anyhow::Context;
use courier_common::{DeliveryOutcome, Message, audit, audit::AuditConfig, internal, logging};
use courier_delivery::{DeliveryConfig, DeliveryOrchestrator};
use serde::{Deserialize, Serialize};

/// Upper bound on the pre-sized dispatch buffer; larger runs grow it as they go
const MAX_PRESIZED_DISPATCHES: usize = 4096;

/// Top level configuration, read from `courier.config.ron`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Courier {
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// One send and its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// 1 for the first pass over the messages, 2 for the first repeat, ...
    pub round: u32,
    pub id: String,
    pub outcome: DeliveryOutcome,
}

impl Courier {
    /// Read a configuration file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        ron::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// The configuration as pretty printed RON
    pub fn to_ron(&self) -> anyhow::Result<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Install logging and audit settings, then build the orchestrator
    pub fn init(&self) -> anyhow::Result<DeliveryOrchestrator> {
        logging::init();
        audit::init(self.audit.clone());

        let orchestrator = DeliveryOrchestrator::from_config(self.delivery.clone())
            .context("Invalid delivery configuration")?;

        internal!(level = INFO, "Courier initialised");

        Ok(orchestrator)
    }

    /// Send every message, in order, `rounds` times over.
    ///
    /// Rounds after the first resend the same ids, so delivered messages come
    /// back from the idempotency store without another provider attempt.
    #[tracing::instrument(level = "trace", skip_all, fields(messages = messages.len(), rounds = rounds))]
    pub async fn dispatch(
        orchestrator: &DeliveryOrchestrator,
        messages: &[Message],
        rounds: u32,
    ) -> Vec<Dispatch> {
        let mut dispatched = Vec::with_capacity(dispatch_capacity(messages.len(), rounds));

        for round in 1..=rounds {
            for message in messages {
                let outcome = orchestrator.send_message(message).await;
                dispatched.push(Dispatch {
                    round,
                    id: message.id.clone(),
                    outcome,
                });
            }
        }

        dispatched
    }
}

fn dispatch_capacity(messages: usize, rounds: u32) -> usize {
    messages
        .saturating_mul(rounds as usize)
        .min(MAX_PRESIZED_DISPATCHES)
}

/// Read a RON list of messages, rejecting any without an id or recipient
pub fn load_messages(path: &Path) -> anyhow::Result<Vec<Message>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read messages from {}", path.display()))?;

    let messages: Vec<Message> = ron::from_str(&content)
        .with_context(|| format!("Failed to parse messages from {}", path.display()))?;

    for (index, message) in messages.iter().enumerate() {
        message
            .validate()
            .with_context(|| format!("Invalid message at position {index}"))?;
    }

    Ok(messages)
}
