//! Integration tests for the node's HTTP surface.

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use node::ledger::{LedgerEntry, StagedLedger};
use node::{AppState, service_record};
use registry::{InMemoryCoordinationStore, ServiceRegistry};
use serde_json::{Value, json};
use sidecar::Sidecar;
use tower::ServiceExt;

const SECRET: &str = "s3cret";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct Node {
    app: Router,
    ledger: Arc<StagedLedger>,
}

/// Builds a node registered as `name` with the given base URL.
async fn build_node(store: &InMemoryCoordinationStore, name: &str, base_url: &str) -> Node {
    let registry = ServiceRegistry::new(store.clone()).with_record(service_record(name, base_url));
    registry.init().await.unwrap();

    let ledger = Arc::new(StagedLedger::new());
    let state = Arc::new(AppState::new(
        Sidecar::with_shared_secret(registry, SECRET),
        ledger.clone(),
    ));
    Node {
        app: node::create_app(state, get_metrics_handle()),
        ledger,
    }
}

/// Binds a loopback listener, registers a node on it and serves it.
async fn spawn_node(store: &InMemoryCoordinationStore, name: &str) -> Node {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let node = build_node(store, name, &base_url).await;

    let app = node.app.clone();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    node
}

async fn seed(ledger: &StagedLedger, account: &str, amount: i64) {
    ledger
        .seed(LedgerEntry {
            reference: format!("seed-{account}"),
            account: account.to_string(),
            amount,
        })
        .await;
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", SECRET)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn transfer(from: (&str, &str), to: (&str, &str), amount: i64) -> Value {
    json!({
        "participants": [
            {
                "service": from.0,
                "auth": SECRET,
                "data": {"reference": "tx-1", "account": from.1, "amount": -amount}
            },
            {
                "service": to.0,
                "auth": SECRET,
                "data": {"reference": "tx-1", "account": to.1, "amount": amount}
            }
        ]
    })
}

#[tokio::test]
async fn test_health_check_is_open() {
    let store = InMemoryCoordinationStore::new();
    let node = build_node(&store, "bank", "http://127.0.0.1:1").await;

    let (status, json) = send(&node.app, get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "bank");
}

#[tokio::test]
async fn test_metrics_endpoint_is_open() {
    let store = InMemoryCoordinationStore::new();
    let node = build_node(&store, "bank", "http://127.0.0.1:1").await;

    let response = node.app.clone().oneshot(get("/metrics", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_guarded_routes_reject_missing_or_wrong_secret() {
    let store = InMemoryCoordinationStore::new();
    let node = build_node(&store, "bank", "http://127.0.0.1:1").await;

    for auth in [None, Some("wrong")] {
        let (status, json) = send(&node.app, get("/ledger", auth)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json, json!({"message": "Service not authorized"}));
    }

    let (status, _) = send(&node.app, get("/ledger", Some(SECRET))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_phase_endpoint_stages_entry() {
    let store = InMemoryCoordinationStore::new();
    let node = build_node(&store, "bank", "http://127.0.0.1:1").await;

    let (status, json) = send(
        &node.app,
        post(
            "/2pc",
            json!({"phase": "prepare", "data": {"reference": "t1", "account": "alice", "amount": 10}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"success": true}));

    let (_, ledger) = send(&node.app, get("/ledger", Some(SECRET))).await;
    assert_eq!(ledger["staged"][0]["reference"], "t1");
    assert_eq!(ledger["committed"], json!([]));
}

#[tokio::test]
async fn test_service_lookup() {
    let store = InMemoryCoordinationStore::new();
    let node = build_node(&store, "bank", "http://bank.internal:3000").await;

    let (status, json) = send(&node.app, get("/services/bank", Some(SECRET))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["url"], "http://bank.internal:3000");

    let (status, json) = send(&node.app, get("/endpoints/bank.ledger.get", Some(SECRET))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["url"], "http://bank.internal:3000/ledger");

    let (status, _) = send(&node.app, get("/services/nobody", Some(SECRET))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&node.app, get("/endpoints/bank", Some(SECRET))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transaction_commits_across_nodes() {
    let store = InMemoryCoordinationStore::new();
    let bank_a = spawn_node(&store, "bank-a").await;
    let bank_b = spawn_node(&store, "bank-b").await;
    seed(&bank_a.ledger, "alice", 100).await;

    let (status, outcome) = send(
        &bank_a.app,
        post("/transactions", transfer(("bank-a", "alice"), ("bank-b", "bob"), 40)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["state"]["state"], "committed");
    assert_eq!(bank_a.ledger.balance("alice").await, 60);
    assert_eq!(bank_b.ledger.balance("bob").await, 40);
    assert!(bank_a.ledger.staged().await.is_empty());
    assert!(bank_b.ledger.staged().await.is_empty());
}

#[tokio::test]
async fn test_refused_prepare_aborts_every_node() {
    let store = InMemoryCoordinationStore::new();
    let bank_a = spawn_node(&store, "bank-a").await;
    let bank_b = spawn_node(&store, "bank-b").await;
    seed(&bank_a.ledger, "alice", 10).await;

    let (status, outcome) = send(
        &bank_b.app,
        post("/transactions", transfer(("bank-a", "alice"), ("bank-b", "bob"), 40)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        outcome["state"],
        json!({"state": "aborted", "failed_phase": "prepare"})
    );
    assert_eq!(outcome["phases"].as_array().unwrap().len(), 2);
    assert_eq!(outcome["phases"][1]["phase"], "abort");

    // bank-b had staged the credit; the abort released it.
    assert!(bank_b.ledger.staged().await.is_empty());
    assert_eq!(bank_b.ledger.balance("bob").await, 0);
    assert_eq!(bank_a.ledger.balance("alice").await, 10);
}

#[tokio::test]
async fn test_unknown_participant_aborts_with_server_error() {
    let store = InMemoryCoordinationStore::new();
    let bank_a = spawn_node(&store, "bank-a").await;
    seed(&bank_a.ledger, "alice", 100).await;

    let (_, outcome) = send(
        &bank_a.app,
        post("/transactions", transfer(("bank-a", "alice"), ("bank-z", "zed"), 5)),
    )
    .await;

    assert_eq!(outcome["state"]["state"], "aborted");
    assert_eq!(outcome["phases"][0]["results"][1]["ctx"], "Server error");
    assert!(bank_a.ledger.staged().await.is_empty());
    assert_eq!(bank_a.ledger.balance("alice").await, 100);
}

#[tokio::test]
async fn test_empty_transaction_is_bad_request() {
    let store = InMemoryCoordinationStore::new();
    let node = build_node(&store, "bank", "http://127.0.0.1:1").await;

    let (status, json) = send(&node.app, post("/transactions", json!({"participants": []}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("participant"));
}
