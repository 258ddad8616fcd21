//! A runnable service node.
//!
//! Registers itself in the service registry, takes part in two-phase
//! commits through a staged ledger, and can orchestrate transactions across
//! other nodes. Every route except `/health` and `/metrics` requires the
//! shared secret in the `Authorization` header.

pub mod config;
pub mod error;
pub mod ledger;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use registry::{CoordinationStore, ServiceRecord, ServiceRegistry};
use sidecar::{Sidecar, require_credential};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use two_phase::{TransactionCoordinator, phase_handler};

use ledger::StagedLedger;

/// Path of the two-phase-commit participant endpoint.
pub const PHASE_PATH: &str = "/2pc";

/// Shared application state accessible from all handlers.
pub struct AppState<S: CoordinationStore> {
    pub coordinator: TransactionCoordinator<S>,
    pub ledger: Arc<StagedLedger>,
}

impl<S: CoordinationStore> AppState<S> {
    pub fn new(sidecar: Sidecar<S>, ledger: Arc<StagedLedger>) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(Arc::new(sidecar)),
            ledger,
        }
    }

    pub fn registry(&self) -> &ServiceRegistry<S> {
        self.coordinator.sidecar().registry()
    }
}

/// The record a node registers: its base URL and one token per route.
pub fn service_record(name: &str, base_url: &str) -> ServiceRecord {
    ServiceRecord::new(name, base_url)
        .endpoint("2pc.post", PHASE_PATH)
        .endpoint("ledger.get", "/ledger")
        .endpoint("transactions.post", "/transactions")
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: CoordinationStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let service_name = state
        .registry()
        .record()
        .map(|record| record.name.clone())
        .unwrap_or_default();
    let verifier = state.coordinator.sidecar().verifier();

    let open = Router::new()
        .route("/health", get(routes::health::check).with_state(service_name))
        .route("/metrics", get(routes::metrics::get).with_state(metrics_handle));

    let guarded = Router::new()
        .route(PHASE_PATH, phase_handler(state.ledger.clone()))
        .route(
            "/ledger",
            get(routes::ledger::list).with_state(state.ledger.clone()),
        )
        .route("/transactions", post(routes::transactions::run::<S>))
        .route("/services/{name}", get(routes::services::get::<S>))
        .route("/endpoints/{token}", get(routes::services::resolve::<S>))
        .with_state(state);

    open.merge(require_credential(guarded, verifier))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
