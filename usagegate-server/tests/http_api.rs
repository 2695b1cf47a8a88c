//! End-to-end tests against the HTTP surface.

use std::sync::Arc;

use serde_json::{Value, json};
use usagegate::MemoryStore;
use usagegate_server::actor::ControlPlaneActor;
use usagegate_server::config::{LimitParams, LimitsTable};
use usagegate_server::metrics::Metrics;
use usagegate_server::transport::http::{AppState, router};

async fn start_server(initial_grant: i64) -> String {
    let store = MemoryStore::builder().initial_grant(initial_grant).build();
    let handle = ControlPlaneActor::spawn(1024, store, 0);
    let limits = LimitsTable::new(LimitParams {
        max_tokens: 3.0,
        refill_rate: 1.0,
        cost: 1.0,
    });
    let state = AppState {
        handle,
        limits,
        metrics: Arc::new(Metrics::new()),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.expect("serve");
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_throttle_allows_then_denies() {
    let base = start_server(0).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let resp: Value = client
            .post(format!("{base}/v1/throttle"))
            .json(&json!({"identifier": "user:1", "endpoint": "generate-menu"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["allowed"], json!(true));
        assert_eq!(resp["retry_after"], json!(0));
    }

    let resp: Value = client
        .post(format!("{base}/v1/throttle"))
        .json(&json!({"identifier": "user:1", "endpoint": "generate-menu"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["allowed"], json!(false));
    assert_eq!(resp["retry_after"], json!(1));
}

#[tokio::test]
async fn test_throttle_rejects_invalid_limit_override() {
    let base = start_server(0).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/throttle"))
        .json(&json!({
            "identifier": "user:1",
            "endpoint": "generate-menu",
            "max_tokens": -5.0
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("limit"));
}

#[tokio::test]
async fn test_consume_is_idempotent() {
    let base = start_server(20).await;
    let client = reqwest::Client::new();

    let request = json!({
        "subject_id": "user:7",
        "amount": 5,
        "idempotency_key": "generate-menu:user:7:2025-W31"
    });

    let first: Value = client
        .post(format!("{base}/v1/credits/consume"))
        .json(&request)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["success"], json!(true));
    assert_eq!(first["new_balance"], json!(15));
    assert!(first.get("reason").is_none());

    let replay: Value = client
        .post(format!("{base}/v1/credits/consume"))
        .json(&request)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(replay["success"], json!(true));
    assert_eq!(replay["new_balance"], json!(15));
    assert_eq!(replay["reason"], json!("already_processed"));

    let balance: Value = client
        .get(format!("{base}/v1/credits/balance/user:7"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(balance["balance"], json!(15));
}

#[tokio::test]
async fn test_insufficient_balance_is_a_decision_not_an_error() {
    let base = start_server(3).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/credits/consume"))
        .json(&json!({
            "subject_id": "user:8",
            "amount": 10,
            "idempotency_key": "photo-scan:user:8:req-1"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["reason"], json!("insufficient_balance"));
}

#[tokio::test]
async fn test_grant_tops_up_balance() {
    let base = start_server(0).await;
    let client = reqwest::Client::new();

    let resp: Value = client
        .post(format!("{base}/v1/credits/grant"))
        .json(&json!({
            "subject_id": "user:9",
            "amount": 50,
            "idempotency_key": "purchase:order-4412"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["success"], json!(true));
    assert_eq!(resp["new_balance"], json!(50));
}

#[tokio::test]
async fn test_zero_amount_is_rejected() {
    let base = start_server(0).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/credits/grant"))
        .json(&json!({
            "subject_id": "user:9",
            "amount": 0,
            "idempotency_key": "purchase:order-0"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_event_award_deduplicates() {
    let base = start_server(0).await;
    let client = reqwest::Client::new();

    let request = json!({
        "user_id": "user:11",
        "event_type": "referral_completed",
        "points": 50,
        "credits": 10,
        "event_id": "evt_77a1"
    });

    let first: Value = client
        .post(format!("{base}/v1/events"))
        .json(&request)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["awarded"], json!(true));

    let second: Value = client
        .post(format!("{base}/v1/events"))
        .json(&request)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["awarded"], json!(false));

    let balance: Value = client
        .get(format!("{base}/v1/credits/balance/user:11"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(balance["balance"], json!(10));
}

#[tokio::test]
async fn test_daily_award_ignores_client_supplied_timestamps() {
    let base = start_server(0).await;
    let client = reqwest::Client::new();

    // The daily window is keyed on server time; instants fabricated a day
    // apart must not reopen it within one real day
    let mut awarded = 0;
    for i in 0..5i64 {
        let request = json!({
            "user_id": "user:12",
            "event_type": "meal_logged",
            "points": 10,
            "credits": 1,
            "timestamp": 1_700_000_000_000_000_000i64 + i * 86_400_000_000_000
        });
        let resp: Value = client
            .post(format!("{base}/v1/events"))
            .json(&request)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if resp["awarded"] == json!(true) {
            awarded += 1;
        }
    }
    assert_eq!(awarded, 1);

    let balance: Value = client
        .get(format!("{base}/v1/credits/balance/user:12"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(balance["balance"], json!(1));
}

#[tokio::test]
async fn test_throttle_rejects_negative_timestamp() {
    let base = start_server(0).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/throttle"))
        .json(&json!({
            "identifier": "user:1",
            "endpoint": "generate-menu",
            "timestamp": -1i64
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("timestamp"));
}

#[tokio::test]
async fn test_health_and_metrics() {
    let base = start_server(0).await;
    let client = reqwest::Client::new();

    let health = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(health, "OK");

    client
        .post(format!("{base}/v1/throttle"))
        .json(&json!({"identifier": "user:1", "endpoint": "generate-menu"}))
        .send()
        .await
        .unwrap();

    let metrics = client
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("usagegate_requests_total 1"));
    assert!(metrics.contains("usagegate_throttle_decisions{outcome=\"allowed\"} 1"));
}
