//! Integration tests for the delivery orchestrator

#![allow(clippy::unwrap_used)]

use std::{sync::Arc, time::Duration};

use courier_delivery::{
    CircuitBreakerConfig, CircuitEvent, CircuitState, DeliveryConfig, DeliveryOrchestrator,
    DeliveryOutcome, DeliveryQueryService, ManualClock, Message, NO_STATUS_FOUND, Provider,
    ProviderConfig, RateLimitConfig, ScriptedProvider,
};
use pretty_assertions::assert_eq;

fn message(id: &str) -> Message {
    Message::new(id, format!("{id}@example.com"), "Hello", "World")
}

fn orchestrator(
    providers: &[&Arc<ScriptedProvider>],
    clock: &Arc<ManualClock>,
) -> DeliveryOrchestrator {
    DeliveryOrchestrator::builder()
        .providers(
            providers
                .iter()
                .map(|provider| Arc::clone(provider) as Arc<dyn Provider>),
        )
        .clock(clock.clone())
        .build()
        .unwrap()
}

fn ms(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_millis).collect()
}

#[tokio::test]
async fn test_idempotent_resend_makes_no_provider_calls() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_succeed("Provider1"));
    let secondary = Arc::new(ScriptedProvider::always_succeed("Provider2"));
    let orchestrator = orchestrator(&[&primary, &secondary], &clock);

    let first = orchestrator.send_message(&message("email1")).await;
    assert_eq!(first.to_string(), "Provider1 success");

    // Well clear of the rate window
    clock.advance(Duration::from_secs(10));
    let second = orchestrator.send_message(&message("email1")).await;

    assert_eq!(second, first);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 0);
    assert_eq!(orchestrator.get_status("email1"), "Provider1 success");
}

#[tokio::test]
async fn test_idempotent_resend_does_not_consume_rate_slot() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_succeed("Provider1"));
    let orchestrator = orchestrator(&[&primary], &clock);

    orchestrator.send_message(&message("email1")).await;
    orchestrator.send_message(&message("email1")).await;
    orchestrator.send_message(&message("email1")).await;

    let outcome = orchestrator.send_message(&message("email2")).await;
    assert_eq!(outcome, DeliveryOutcome::delivered("Provider1"));
    assert_eq!(primary.calls(), 2);
}

#[tokio::test]
async fn test_third_send_in_window_is_rate_limited() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_succeed("Provider1"));
    let orchestrator = orchestrator(&[&primary], &clock);

    let a = orchestrator.send_message(&message("a")).await;
    let b = orchestrator.send_message(&message("b")).await;
    let c = orchestrator.send_message(&message("c")).await;

    assert_eq!(a.to_string(), "Provider1 success");
    assert_eq!(b.to_string(), "Provider1 success");
    assert_eq!(c.to_string(), "Failed - Rate Limit");
    assert_eq!(orchestrator.get_status("c"), "Failed - Rate Limit");
    assert_eq!(primary.calls(), 2);

    // Rejections do not count against the breaker
    assert_eq!(orchestrator.circuit_breaker().consecutive_failures(), 0);

    // A start exactly one interval old has left the window
    clock.advance(Duration::from_millis(1_000));
    let c = orchestrator.send_message(&message("c")).await;
    assert_eq!(c, DeliveryOutcome::delivered("Provider1"));
    assert_eq!(orchestrator.get_status("c"), "Provider1 success");
}

#[tokio::test]
async fn test_rate_window_slides() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_succeed("Provider1"));
    let orchestrator = orchestrator(&[&primary], &clock);

    orchestrator.send_message(&message("a")).await;
    clock.advance(Duration::from_millis(600));
    orchestrator.send_message(&message("b")).await;

    clock.advance(Duration::from_millis(399));
    assert_eq!(
        orchestrator.send_message(&message("c")).await,
        DeliveryOutcome::RateLimited
    );

    // "a" started 1000ms ago, "b" is still in the window
    clock.advance(Duration::from_millis(1));
    assert_eq!(
        orchestrator.send_message(&message("d")).await,
        DeliveryOutcome::delivered("Provider1")
    );
    assert_eq!(
        orchestrator.send_message(&message("e")).await,
        DeliveryOutcome::RateLimited
    );
}

#[tokio::test]
async fn test_circuit_opens_after_three_exhausted_sends_and_recovers() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_fail("Provider1"));
    let secondary = Arc::new(ScriptedProvider::fail_times("Provider2", 9));
    let orchestrator = orchestrator(&[&primary, &secondary], &clock);

    // Each exhausted send sleeps 1400ms, which also clears the rate window
    for id in ["m1", "m2", "m3"] {
        let outcome = orchestrator.send_message(&message(id)).await;
        assert_eq!(outcome.to_string(), "Failed");
    }
    assert_eq!(orchestrator.circuit_breaker().state(), CircuitState::Open);
    assert_eq!(orchestrator.circuit_breaker().consecutive_failures(), 3);
    assert_eq!(primary.calls(), 9);
    assert_eq!(secondary.calls(), 9);

    let rejected = orchestrator.send_message(&message("m4")).await;
    assert_eq!(rejected.to_string(), "Failed - Circuit Open");
    assert_eq!(orchestrator.get_status("m4"), "Failed - Circuit Open");
    assert_eq!(primary.calls(), 9);
    assert_eq!(secondary.calls(), 9);

    // Recovery requires strictly more than the interval
    clock.advance(Duration::from_millis(30_000));
    assert_eq!(
        orchestrator.send_message(&message("m4")).await,
        DeliveryOutcome::CircuitOpen
    );

    clock.advance(Duration::from_millis(1));
    let outcome = orchestrator.send_message(&message("m4")).await;
    assert_eq!(outcome.to_string(), "Provider2 success");
    assert_eq!(orchestrator.get_status("m4"), "Provider2 success");
    assert_eq!(orchestrator.circuit_breaker().state(), CircuitState::Closed);
    assert_eq!(orchestrator.circuit_breaker().consecutive_failures(), 0);
}

#[tokio::test]
async fn test_breaker_is_checked_before_idempotency() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::new("Provider1", [true], false));
    let orchestrator = orchestrator(&[&primary], &clock);

    let first = orchestrator.send_message(&message("email1")).await;
    assert_eq!(first.to_string(), "Provider1 success");

    for id in ["m1", "m2", "m3"] {
        clock.advance(Duration::from_secs(1));
        assert_eq!(
            orchestrator.send_message(&message(id)).await,
            DeliveryOutcome::Failed
        );
    }
    assert_eq!(orchestrator.circuit_breaker().state(), CircuitState::Open);

    let resend = orchestrator.send_message(&message("email1")).await;
    assert_eq!(resend.to_string(), "Failed - Circuit Open");
    assert_eq!(orchestrator.get_status("email1"), "Failed - Circuit Open");
    assert_eq!(primary.calls(), 10);
}

#[tokio::test]
async fn test_failed_trial_after_recovery_counts_from_zero() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_fail("Provider1"));
    let orchestrator = orchestrator(&[&primary], &clock);

    for id in ["m1", "m2", "m3"] {
        orchestrator.send_message(&message(id)).await;
    }
    assert_eq!(orchestrator.circuit_breaker().state(), CircuitState::Open);

    clock.advance(Duration::from_secs(31));
    let outcome = orchestrator.send_message(&message("m4")).await;

    assert_eq!(outcome, DeliveryOutcome::Failed);
    assert_eq!(orchestrator.circuit_breaker().state(), CircuitState::Closed);
    assert_eq!(orchestrator.circuit_breaker().consecutive_failures(), 1);
}

#[tokio::test]
async fn test_breaker_events() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_fail("Provider1"));
    let orchestrator = DeliveryOrchestrator::builder()
        .provider(primary.clone())
        .circuit_breaker(CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_interval_ms: 5_000,
        })
        .clock(clock.clone())
        .build()
        .unwrap();
    let mut events = orchestrator.circuit_breaker().subscribe();

    orchestrator.send_message(&message("m1")).await;
    orchestrator.send_message(&message("m2")).await;
    assert_eq!(
        events.try_recv().unwrap(),
        CircuitEvent::Opened {
            consecutive_failures: 2
        }
    );

    clock.advance(Duration::from_millis(5_001));
    orchestrator.send_message(&message("m3")).await;
    assert_eq!(events.try_recv().unwrap(), CircuitEvent::Recovered);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_get_status_matches_returned_outcome() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::new(
        "Provider1",
        [true, false, false, false],
        true,
    ));
    let orchestrator = orchestrator(&[&primary], &clock);

    assert_eq!(orchestrator.get_status("email1"), NO_STATUS_FOUND);
    assert_eq!(orchestrator.get_status("email1"), "No status found");

    for id in ["email1", "email2", "email3"] {
        let outcome = orchestrator.send_message(&message(id)).await;
        assert_eq!(orchestrator.get_status(id), outcome.to_string());
    }

    assert_eq!(orchestrator.get_status("email1"), "Provider1 success");
    assert_eq!(orchestrator.get_status("email2"), "Failed");
    assert_eq!(orchestrator.get_status("email3"), "Failed - Rate Limit");
    assert_eq!(orchestrator.get_status("unknown"), NO_STATUS_FOUND);
}

#[tokio::test]
async fn test_get_status_is_pure() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_succeed("Provider1"));
    let orchestrator = orchestrator(&[&primary], &clock);

    for _ in 0..5 {
        assert_eq!(orchestrator.get_status("email1"), NO_STATUS_FOUND);
    }

    assert_eq!(orchestrator.tracked_messages(), 0);
    assert_eq!(orchestrator.rate_limit_stats().in_window, 0);
    assert_eq!(primary.calls(), 0);
}

#[tokio::test]
async fn test_backoff_doubles_and_resets_per_provider() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_fail("Provider1"));
    let secondary = Arc::new(ScriptedProvider::always_fail("Provider2"));
    let orchestrator = orchestrator(&[&primary, &secondary], &clock);

    let outcome = orchestrator.send_message(&message("email1")).await;

    assert_eq!(outcome, DeliveryOutcome::Failed);
    assert_eq!(clock.sleeps(), ms(&[100, 200, 400, 100, 200, 400]));
    assert_eq!(orchestrator.circuit_breaker().consecutive_failures(), 1);
}

#[tokio::test]
async fn test_fallback_to_second_provider() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_fail("Provider1"));
    let secondary = Arc::new(ScriptedProvider::always_succeed("Provider2"));
    let orchestrator = orchestrator(&[&primary, &secondary], &clock);

    orchestrator.circuit_breaker().record_failure();
    let outcome = orchestrator.send_message(&message("email1")).await;

    assert_eq!(outcome.to_string(), "Provider2 success");
    assert_eq!(primary.calls(), 3);
    assert_eq!(secondary.calls(), 1);
    assert_eq!(clock.sleeps(), ms(&[100, 200, 400]));
    assert!(orchestrator.is_already_sent("email1"));
    assert_eq!(orchestrator.circuit_breaker().consecutive_failures(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_ids() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_succeed("Provider1"));
    let orchestrator = Arc::new(
        DeliveryOrchestrator::builder()
            .provider(primary.clone())
            .rate_limit(RateLimitConfig {
                limit: 100,
                interval_ms: 1_000,
            })
            .clock(clock)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .send_message(&message(&format!("email{i}")))
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), DeliveryOutcome::delivered("Provider1"));
    }

    assert_eq!(primary.calls(), 20);
    assert_eq!(orchestrator.tracked_messages(), 20);
    for i in 0..20 {
        assert!(orchestrator.is_already_sent(&format!("email{i}")));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_never_exceed_rate_limit() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_succeed("Provider1"));
    let orchestrator = Arc::new(orchestrator(&[&primary], &clock));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .send_message(&message(&format!("email{i}")))
                    .await
            })
        })
        .collect();

    let mut delivered = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            DeliveryOutcome::Delivered { .. } => delivered += 1,
            DeliveryOutcome::RateLimited => limited += 1,
            other => panic!("unexpected outcome {other}"),
        }
    }

    assert_eq!(delivered, 2);
    assert_eq!(limited, 8);
    assert_eq!(primary.calls(), 2);
}

#[tokio::test]
async fn test_from_config_with_reliable_providers() {
    let config = DeliveryConfig {
        providers: vec![
            ProviderConfig {
                name: "Primary".to_string(),
                failure_rate: 0.0,
            },
            ProviderConfig {
                name: "Backup".to_string(),
                failure_rate: 0.0,
            },
        ],
        ..DeliveryConfig::default()
    };
    let orchestrator = DeliveryOrchestrator::from_config(config).unwrap();

    let outcome = orchestrator.send_message(&message("email1")).await;
    assert_eq!(outcome.to_string(), "Primary success");

    let stats = orchestrator.circuit_breaker_stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.consecutive_failures, 0);
}

#[tokio::test]
async fn test_independent_orchestrators_do_not_share_state() {
    let clock = Arc::new(ManualClock::new());
    let primary = Arc::new(ScriptedProvider::always_succeed("Provider1"));
    let first = orchestrator(&[&primary], &clock);
    let second = orchestrator(&[&primary], &clock);

    first.send_message(&message("a")).await;
    first.send_message(&message("b")).await;

    assert_eq!(
        second.send_message(&message("a")).await,
        DeliveryOutcome::delivered("Provider1")
    );
    assert_eq!(second.get_status("b"), NO_STATUS_FOUND);
    assert_eq!(primary.calls(), 3);
}
