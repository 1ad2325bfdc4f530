use autopay_core::adapters::MemoryTransactionStore;
use autopay_core::config::{Config, RateLimitSpec, RateWindow};
use autopay_core::security::sign;
use autopay_core::services::{IngestOutcome, IngestionService, StorePolicy};
use autopay_core::validation::WebhookPayload;
use autopay_core::{create_app, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use futures::future::join_all;
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "idempotency_secret";

fn payload(tx_id: &str) -> String {
    format!(
        r#"{{"tx_id":"{}","amount":"42.00","currency":"EUR","sender_account":"ACC_1","receiver_account":"ACC_2"}}"#,
        tx_id
    )
}

#[tokio::test]
async fn test_concurrent_ingest_stores_once() {
    let store = MemoryTransactionStore::new();
    let service = IngestionService::new(Arc::new(store.clone()), StorePolicy::default());
    let tx = WebhookPayload::from_slice(payload("tx_race").as_bytes())
        .unwrap()
        .validate()
        .unwrap();

    let attempts = (0..32).map(|_| {
        let service = service.clone();
        let tx = tx.clone();
        tokio::spawn(async move { service.ingest(tx).await })
    });

    let outcomes: Vec<IngestOutcome> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let processed = outcomes
        .iter()
        .filter(|o| matches!(o, IngestOutcome::Processed(_)))
        .count();
    assert_eq!(processed, 1);
    assert!(outcomes.iter().all(|o| o.tx_id() == "tx_race"));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_concurrent_webhooks_over_http_store_once() {
    let store = MemoryTransactionStore::new();
    let config = Config {
        hmac_secret_key: Some(SECRET.to_string()),
        webhook_rate_limit: RateLimitSpec::per(1000, RateWindow::Minute),
        ..Config::default()
    };
    let app = create_app(AppState::new(&config, Arc::new(store.clone())).unwrap());

    let body = payload("tx_http_race");
    let requests = (0..16).map(|_| {
        let ts = chrono::Utc::now().timestamp().to_string();
        let signature = sign(SECRET.as_bytes(), &ts, body.as_bytes());
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-timestamp", ts)
            .header("x-signature", signature)
            .body(Body::from(body.clone()))
            .unwrap();
        app.clone().oneshot(request)
    });

    let mut statuses = Vec::new();
    for response in join_all(requests).await {
        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        statuses.push(json["status"].as_str().unwrap().to_string());
    }

    assert_eq!(statuses.iter().filter(|s| *s == "processed").count(), 1);
    assert_eq!(statuses.iter().filter(|s| *s == "duplicate").count(), 15);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_distinct_ids_are_independent() {
    let store = MemoryTransactionStore::new();
    let service = IngestionService::new(Arc::new(store.clone()), StorePolicy::default());

    for tx_id in ["tx_a", "tx_b", "tx_c"] {
        let tx = WebhookPayload::from_slice(payload(tx_id).as_bytes())
            .unwrap()
            .validate()
            .unwrap();
        assert!(matches!(
            service.ingest(tx).await.unwrap(),
            IngestOutcome::Processed(_)
        ));
    }
    assert_eq!(store.len().await, 3);
}
