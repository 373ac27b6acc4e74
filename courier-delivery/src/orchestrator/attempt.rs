//! Retry and fallback across the provider chain

use courier_common::{
    DeliveryOutcome, Message, audit,
    tracing::{debug, warn},
};

use super::DeliveryOrchestrator;

impl DeliveryOrchestrator {
    /// Run the attempt sequence for an admitted message.
    ///
    /// Each provider, in priority order, gets `max_retries` attempts with a
    /// backoff sleep after every failure. The first success ends the sequence.
    pub(crate) async fn attempt_delivery(&self, message: &Message) -> DeliveryOutcome {
        let started = self.clock.now();
        let mut total_attempts = 0u32;

        for provider in &self.providers {
            let name = provider.name();
            let mut attempt = 0u32;

            while self.retry_policy.should_retry(attempt) {
                attempt += 1;
                total_attempts += 1;
                audit::log_provider_attempt(&message.id, name, attempt);

                match provider.attempt(message).await {
                    Ok(()) => {
                        audit::log_delivery_success(
                            &message.id,
                            name,
                            total_attempts,
                            self.clock.now().duration_since(started).as_millis(),
                        );
                        return DeliveryOutcome::delivered(name);
                    }
                    Err(error) => {
                        let delay = self.retry_policy.delay_for(attempt);
                        debug!(
                            message_id = %message.id,
                            provider = %name,
                            attempt,
                            max_retries = self.retry_policy.max_retries,
                            delay_ms = delay.as_millis(),
                            error = %error,
                            "Provider attempt failed, backing off"
                        );
                        self.clock.sleep(delay).await;
                    }
                }
            }

            warn!(
                message_id = %message.id,
                provider = %name,
                attempts = attempt,
                "Provider exhausted its retries"
            );
        }

        audit::log_delivery_failure(
            &message.id,
            total_attempts,
            self.clock.now().duration_since(started).as_millis(),
        );

        DeliveryOutcome::Failed
    }
}
