//! End-to-end pipeline tests: capture → schedule → forward → ledger.
//!
//! Requires a running PostgreSQL instance
//! (`HOOKFREIGHT_TEST_DATABASE_URL`, defaulting to a local
//! `hookfreight_test` database).

#![cfg(feature = "integration")]

mod common;

use std::time::Duration;

use common::{chain_order, TestRelay, TEST_MAX_BODY_BYTES};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Happy path: one event stored byte-exact, one delivered attempt with no
/// parent.
#[tokio::test]
async fn test_capture_and_deliver_happy_path() {
    let relay = TestRelay::start(5).await;
    let destination = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sink"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&destination)
        .await;

    let endpoint = relay
        .make_endpoint(&format!("{}/sink", destination.uri()))
        .await;

    let body = br#"{"x":1}"#;
    let response = reqwest::Client::new()
        .post(relay.ingest_url(&endpoint))
        .header("content-type", "application/json")
        .body(body.to_vec())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let envelope: serde_json::Value = response.json().await.unwrap();
    assert_eq!(envelope["message"], "event_created");
    assert!(envelope["data"].is_null());

    let events = relay.events_for(&endpoint).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].body, body.to_vec());
    assert_eq!(events[0].size_bytes as usize, body.len());
    assert_eq!(events[0].method, "POST");

    let deliveries = relay
        .wait_for_deliveries(events[0].id, 1, Duration::from_secs(10))
        .await;
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].status, "delivered");
    assert_eq!(deliveries[0].response_status, Some(200));
    assert!(deliveries[0].parent_delivery_id.is_none());
}

/// A destination that always returns 500 burns the whole retry budget,
/// producing a linked chain with increasing gaps between attempts.
#[tokio::test]
async fn test_5xx_retries_until_budget_exhausted() {
    let relay = TestRelay::start(3).await;
    let destination = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&destination)
        .await;

    let endpoint = relay.make_endpoint(&destination.uri()).await;

    reqwest::Client::new()
        .post(relay.ingest_url(&endpoint))
        .body("retry me")
        .send()
        .await
        .unwrap();

    let events = relay.events_for(&endpoint).await;
    let deliveries = relay
        .wait_for_deliveries(events[0].id, 3, Duration::from_secs(20))
        .await;

    assert_eq!(deliveries.len(), 3);
    for d in &deliveries {
        assert_eq!(d.status, "failed");
        assert_eq!(d.response_status, Some(500));
    }

    let chain = chain_order(deliveries);
    // Backoff: >= 1000ms between attempts 1→2, >= 2000ms between 2→3.
    let gap1 = (chain[1].created_at - chain[0].created_at).num_milliseconds();
    let gap2 = (chain[2].created_at - chain[1].created_at).num_milliseconds();
    assert!(gap1 >= 1000, "first retry gap was {gap1}ms");
    assert!(gap2 >= 2000, "second retry gap was {gap2}ms");

    // No fourth attempt arrives.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let after = relay
        .wait_for_deliveries(events[0].id, 3, Duration::from_secs(1))
        .await;
    assert_eq!(after.len(), 3);
}

/// A 4xx reply terminates the chain immediately, whatever the budget.
#[tokio::test]
async fn test_4xx_terminates_chain() {
    let relay = TestRelay::start(5).await;
    let destination = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&destination)
        .await;

    let endpoint = relay.make_endpoint(&destination.uri()).await;

    reqwest::Client::new()
        .post(relay.ingest_url(&endpoint))
        .body("rejected")
        .send()
        .await
        .unwrap();

    let events = relay.events_for(&endpoint).await;
    let deliveries = relay
        .wait_for_deliveries(events[0].id, 1, Duration::from_secs(10))
        .await;
    assert_eq!(deliveries[0].status, "failed");
    assert_eq!(deliveries[0].response_status, Some(400));

    tokio::time::sleep(Duration::from_secs(3)).await;
    let after = relay
        .wait_for_deliveries(events[0].id, 1, Duration::from_secs(1))
        .await;
    assert_eq!(after.len(), 1, "4xx must not consume further attempts");
}

/// The self-forward guard records a failed delivery without any outbound
/// request.
#[tokio::test]
async fn test_self_forward_guard_refuses() {
    let relay = TestRelay::start(5).await;
    let own_hook = format!("{}/deadbeefdeadbeefdeadbeef", relay.base_url);
    let endpoint = relay.make_endpoint(&own_hook).await;

    reqwest::Client::new()
        .post(relay.ingest_url(&endpoint))
        .body("loop")
        .send()
        .await
        .unwrap();

    let events = relay.events_for(&endpoint).await;
    let deliveries = relay
        .wait_for_deliveries(events[0].id, 1, Duration::from_secs(10))
        .await;

    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].status, "failed");
    assert_eq!(
        deliveries[0].error_message.as_deref(),
        Some("forward URL points to a HookFreight webhook URL")
    );
    assert!(deliveries[0].response_status.is_none());
}

/// Oversized bodies are rejected before anything is written.
#[tokio::test]
async fn test_oversize_body_rejected() {
    let relay = TestRelay::start(5).await;
    let endpoint = relay.make_endpoint("http://127.0.0.1:9/unused").await;

    let oversize = vec![b'x'; TEST_MAX_BODY_BYTES + 1];
    let response = reqwest::Client::new()
        .post(relay.ingest_url(&endpoint))
        .body(oversize)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 413);
    let envelope: serde_json::Value = response.json().await.unwrap();
    assert_eq!(envelope["message"], "payload_too_large");

    assert!(relay.events_for(&endpoint).await.is_empty());
}

/// Unsupported methods are filtered before capture.
#[tokio::test]
async fn test_method_filter_rejects_delete() {
    let relay = TestRelay::start(5).await;
    let endpoint = relay.make_endpoint("http://127.0.0.1:9/unused").await;

    let response = reqwest::Client::new()
        .delete(relay.ingest_url(&endpoint))
        .body("nope")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 405);
    let envelope: serde_json::Value = response.json().await.unwrap();
    assert_eq!(envelope["message"], "method_not_allowed");

    assert!(relay.events_for(&endpoint).await.is_empty());
}

/// Unknown tokens 404 without capturing anything.
#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let relay = TestRelay::start(5).await;

    let response = reqwest::Client::new()
        .post(format!("{}/ffffffffffffffffffffffff", relay.base_url))
        .body("who dis")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let envelope: serde_json::Value = response.json().await.unwrap();
    assert_eq!(envelope["message"], "endpoint_not_found");
}

/// Deleting an app removes its endpoints and their events in one go.
#[tokio::test]
async fn test_app_delete_cascades_to_endpoints_and_events() {
    let relay = TestRelay::start(5).await;
    let destination = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&destination)
        .await;

    let endpoint = relay.make_endpoint(&destination.uri()).await;
    reqwest::Client::new()
        .post(relay.ingest_url(&endpoint))
        .body("doomed")
        .send()
        .await
        .unwrap();
    assert_eq!(relay.events_for(&endpoint).await.len(), 1);

    let app_id = hookfreight_core::AppId::from_uuid(endpoint.app_id);
    let response = reqwest::Client::new()
        .delete(format!("{}/api/apps/{}", relay.base_url, app_id))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let envelope: serde_json::Value = response.json().await.unwrap();
    assert_eq!(envelope["message"], "app_deleted");

    assert!(relay.events_for(&endpoint).await.is_empty());
    assert!(
        hookfreight_db::models::Endpoint::find_by_id(&relay.pool, endpoint.id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        hookfreight_db::models::App::find_by_id(&relay.pool, endpoint.app_id)
            .await
            .unwrap()
            .is_none()
    );
}

/// Submitting the delivery job for the same event twice yields one job.
#[tokio::test]
async fn test_enqueue_is_idempotent_per_event() {
    let relay = TestRelay::start(5).await;
    let destination = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&destination)
        .await;

    let endpoint = relay.make_endpoint(&destination.uri()).await;
    reqwest::Client::new()
        .post(relay.ingest_url(&endpoint))
        .body("once")
        .send()
        .await
        .unwrap();

    let events = relay.events_for(&endpoint).await;
    let duplicate = relay
        .scheduler
        .enqueue(events[0].id, endpoint.id)
        .await
        .unwrap();
    assert!(duplicate.is_none(), "second enqueue must collapse");
}
