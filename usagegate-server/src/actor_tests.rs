use std::time::SystemTime;

use usagegate::{ConsumeReason, MemoryStore, RateLimit};

use crate::actor::{ControlPlaneActor, ControlPlaneHandle};
use crate::types::{CreditRequest, EventRequest, ThrottleRequest};

fn spawn_plane(initial_grant: i64) -> ControlPlaneHandle {
    let store = MemoryStore::builder().initial_grant(initial_grant).build();
    ControlPlaneActor::spawn(64, store, 0)
}

fn throttle_request(identifier: &str, limit: RateLimit) -> ThrottleRequest {
    ThrottleRequest {
        identifier: identifier.to_string(),
        endpoint: "generate-menu".to_string(),
        limit,
        timestamp: SystemTime::now(),
    }
}

fn credit_request(subject: &str, amount: i64, key: &str) -> CreditRequest {
    CreditRequest {
        subject_id: subject.to_string(),
        amount,
        idempotency_key: key.to_string(),
        timestamp: SystemTime::now(),
    }
}

#[tokio::test]
async fn test_throttle_through_actor() {
    let handle = spawn_plane(0);
    let limit = RateLimit::new(3.0, 1.0, 1.0);

    for _ in 0..3 {
        let decision = handle
            .throttle(throttle_request("user:1", limit))
            .await
            .unwrap();
        assert!(decision.allowed);
    }

    let decision = handle
        .throttle(throttle_request("user:1", limit))
        .await
        .unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.retry_after_secs, Some(1));
}

#[tokio::test]
async fn test_concurrent_consume_applies_exactly_once() {
    let handle = spawn_plane(100);

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            handle
                .consume(credit_request("user:1", 5, "menu:user:1:2025-W31"))
                .await
                .unwrap()
        }));
    }

    let mut applied = 0;
    let mut replayed = 0;
    for task in tasks {
        let result = task.await.unwrap();
        assert!(result.success);
        assert_eq!(result.new_balance, Some(95));
        match result.reason {
            None => applied += 1,
            Some(ConsumeReason::AlreadyProcessed) => replayed += 1,
            Some(other) => panic!("unexpected reason: {other:?}"),
        }
    }

    // Twenty racing submissions, one debit
    assert_eq!(applied, 1);
    assert_eq!(replayed, 19);
    assert_eq!(handle.balance("user:1".to_string()).await.unwrap(), 95);
}

#[tokio::test]
async fn test_grant_then_consume() {
    let handle = spawn_plane(0);

    let result = handle
        .grant(credit_request("user:2", 30, "purchase:order-771"))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.new_balance, Some(30));

    let result = handle
        .consume(credit_request("user:2", 10, "menu:user:2:2025-W31"))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.new_balance, Some(20));
}

#[tokio::test]
async fn test_event_dedup_by_provider_id() {
    let handle = spawn_plane(0);

    let request = EventRequest {
        user_id: "user:3".to_string(),
        event_type: "referral_completed".to_string(),
        points: 50,
        credits: 10,
        event_id: Some("evt_abc123".to_string()),
        timestamp: SystemTime::now(),
    };

    let outcome = handle.record_event(request.clone()).await.unwrap();
    assert!(outcome.awarded);

    let outcome = handle.record_event(request).await.unwrap();
    assert!(!outcome.awarded);

    // Awarded credits applied exactly once
    assert_eq!(handle.balance("user:3".to_string()).await.unwrap(), 10);
}
