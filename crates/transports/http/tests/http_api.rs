//! End-to-end HTTP surface tests
//!
//! A full gateway state (ingest core + live forwarding engine) behind a
//! real listener, driven with reqwest. Downstream targets are mock axum
//! servers on ephemeral ports.

use axum::extract::State as AxumState;
use axum::http::StatusCode as AxStatus;
use axum::routing::post;
use axum::{Json as AxJson, Router};
use mcp_gateway_core::{GatewayMetrics, IngestCore, StreamRegistry};
use mcp_gateway_forwarding::{FederationRouter, ForwardingEngine};
use mcp_gateway_http::{AppState, HttpServer};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct TestGateway {
    base: String,
    metrics: Arc<GatewayMetrics>,
    engine: Arc<ForwardingEngine>,
}

async fn start_gateway() -> TestGateway {
    let metrics = Arc::new(GatewayMetrics::new());
    let streams = Arc::new(StreamRegistry::new(Arc::clone(&metrics)));
    let engine = Arc::new(ForwardingEngine::new(Arc::clone(&metrics), Vec::new()));
    engine.start().await.unwrap();

    let sink: Arc<dyn mcp_gateway_core::EventSink> = engine.clone();
    let ingest = Arc::new(IngestCore::new(Arc::clone(&metrics), streams, Some(sink)));
    let state = AppState {
        ingest,
        engine: Some(Arc::clone(&engine)),
        federation: Some(Arc::new(FederationRouter::new())),
    };

    let router = HttpServer::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestGateway {
        base: format!("http://{addr}"),
        metrics,
        engine,
    }
}

/// Mock downstream target counting deliveries
async fn spawn_downstream() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));

    async fn handler(AxumState(hits): AxumState<Arc<AtomicUsize>>, _body: AxJson<Value>) -> AxStatus {
        hits.fetch_add(1, Ordering::SeqCst);
        AxStatus::OK
    }

    let router = Router::new()
        .route("/events", post(handler))
        .with_state(Arc::clone(&hits));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}/events"), hits)
}

fn candidate(id: &str) -> Value {
    json!({
        "event_id": id,
        "event_type": "user.created",
        "source": "auth",
        "data": "{\"user_id\":\"123\"}"
    })
}

fn target_definition(id: &str, endpoint: &str, event_type: &str) -> Value {
    json!({
        "id": id,
        "name": format!("{id} downstream"),
        "type": "http",
        "endpoint": endpoint,
        "config": {"timeout_secs": 5, "retry_attempts": 0, "retry_delay_ms": 10},
        "rules": [{
            "id": "by-type",
            "name": "by type",
            "conditions": [
                {"field": "event_type", "operator": "eq", "value": event_type}
            ]
        }]
    })
}

#[tokio::test]
async fn valid_single_ingest_is_accepted_and_counted() {
    let gateway = start_gateway().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/v1/events", gateway.base))
        .json(&candidate("e1"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["event_id"], "e1");
    assert_eq!(body["status"], "accepted");
    assert_eq!(gateway.metrics.snapshot().total_events, 1);
}

#[tokio::test]
async fn invalid_json_data_returns_400_and_counts_an_error() {
    let gateway = start_gateway().await;
    let client = reqwest::Client::new();

    let mut body = candidate("e1");
    body["data"] = json!("{oops");
    let response = client
        .post(format!("{}/api/v1/events", gateway.base))
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let error: Value = response.json().await.unwrap();
    assert!(error["message"].as_str().unwrap().contains("JSON"));

    let snapshot = gateway.metrics.snapshot();
    assert_eq!(snapshot.error_events, 1);
    assert_eq!(snapshot.forwarded_events, 0);
}

#[tokio::test]
async fn batch_with_mixed_validity_reports_each_outcome() {
    let gateway = start_gateway().await;
    let client = reqwest::Client::new();

    let mut invalid = candidate("");
    invalid["event_id"] = json!("");
    let response = client
        .post(format!("{}/api/v1/events/batch", gateway.base))
        .json(&json!([candidate("a"), invalid, candidate("c")]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["processed"], 3);
    let statuses: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["accepted", "error", "accepted"]);
}

#[tokio::test]
async fn empty_batch_is_400_and_oversized_batch_is_413() {
    let gateway = start_gateway().await;
    let client = reqwest::Client::new();

    let empty = client
        .post(format!("{}/api/v1/events/batch", gateway.base))
        .json(&json!([]))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 400);

    let oversized: Vec<Value> = (0..1001).map(|i| candidate(&format!("e{i}"))).collect();
    let too_big = client
        .post(format!("{}/api/v1/events/batch", gateway.base))
        .json(&oversized)
        .send()
        .await
        .unwrap();
    assert_eq!(too_big.status(), 413);
}

#[tokio::test]
async fn legacy_ingest_accepts_the_minimal_shape() {
    let gateway = start_gateway().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/mcp", gateway.base))
        .json(&json!({"id": "legacy-1", "data": "{\"k\":1}"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "accepted");

    let bad = client
        .post(format!("{}/mcp", gateway.base))
        .json(&json!({"id": "legacy-2", "data": "not json"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);
}

#[tokio::test]
async fn target_management_round_trip() {
    let gateway = start_gateway().await;
    let client = reqwest::Client::new();
    let (endpoint, _hits) = spawn_downstream().await;
    let targets_url = format!("{}/api/v1/forwarding/targets", gateway.base);

    // Create.
    let created = client
        .post(&targets_url)
        .json(&target_definition("audit", &endpoint, "user.created"))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    let body: Value = created.json().await.unwrap();
    assert_eq!(body["status"], "created");
    assert_eq!(body["target_id"], "audit");

    // Duplicate id conflicts.
    let duplicate = client
        .post(&targets_url)
        .json(&target_definition("audit", &endpoint, "user.created"))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), 409);

    // List and get.
    let listed: Value = client.get(&targets_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let fetched = client
        .get(format!("{targets_url}/audit"))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), 200);
    let fetched: Value = fetched.json().await.unwrap();
    assert_eq!(fetched["id"], "audit");
    assert!(fetched["stats"]["events_sent"].is_number());

    // Update.
    let updated = client
        .put(format!("{targets_url}/audit"))
        .json(&target_definition("audit", &endpoint, "user.deleted"))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), 200);

    // Delete, then 404.
    let deleted = client
        .delete(format!("{targets_url}/audit"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);
    let gone = client
        .get(format!("{targets_url}/audit"))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn ingest_flows_through_to_a_matching_target() {
    let gateway = start_gateway().await;
    let client = reqwest::Client::new();
    let (endpoint, hits) = spawn_downstream().await;

    gateway
        .engine
        .add_target(
            serde_json::from_value(target_definition("hook", &endpoint, "user.created")).unwrap(),
        )
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/v1/events", gateway.base))
        .json(&candidate("e1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Forwarding is detached from the ingest response; poll briefly.
    let mut delivered = 0;
    for _ in 0..50 {
        delivered = hits.load(Ordering::SeqCst);
        if delivered > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(delivered, 1);

    let metrics: Value = client
        .get(format!("{}/api/v1/forwarding/metrics", gateway.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["targets"]["hook"]["events_sent"], 1);
}

#[tokio::test]
async fn management_surface_is_503_without_an_engine() {
    let metrics = Arc::new(GatewayMetrics::new());
    let streams = Arc::new(StreamRegistry::new(Arc::clone(&metrics)));
    let ingest = Arc::new(IngestCore::new(Arc::clone(&metrics), streams, None));
    let state = AppState {
        ingest,
        engine: None,
        federation: None,
    };

    let router = HttpServer::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::new();
    for path in [
        "/api/v1/forwarding/targets",
        "/api/v1/forwarding/metrics",
        "/api/v1/federation/servers",
    ] {
        let response = client
            .get(format!("http://{addr}{path}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 503, "{path}");
    }

    // Ingestion still works without forwarding.
    let accepted = client
        .post(format!("http://{addr}/api/v1/events"))
        .json(&candidate("e1"))
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), 200);
}

#[tokio::test]
async fn health_ready_and_metrics_probes() {
    let gateway = start_gateway().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/v1/events", gateway.base))
        .json(&candidate("e1"))
        .send()
        .await
        .unwrap();

    let health: Value = client
        .get(format!("{}/health", gateway.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["version"].is_string());
    assert_eq!(health["stats"]["total_events"], 1);

    let ready: Value = client
        .get(format!("{}/ready", gateway.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ready["status"], "ready");

    // /stats serves the same counters as /api/v1/metrics.
    let stats: Value = client
        .get(format!("{}/stats", gateway.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let metrics: Value = client
        .get(format!("{}/api/v1/metrics", gateway.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_events"], metrics["total_events"]);
}

#[tokio::test]
async fn cors_preflight_is_a_no_op() {
    let gateway = start_gateway().await;
    let client = reqwest::Client::new();

    let response = client
        .request(reqwest::Method::OPTIONS, format!("{}/api/v1/events", gateway.base))
        .header("Origin", "http://example.com")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}
