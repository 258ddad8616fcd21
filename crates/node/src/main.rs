//! Node entry point.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use node::config::{Config, LogFormat};
use node::ledger::StagedLedger;
use node::{AppState, service_record};
use registry::{
    CoordinationStore, EtcdCoordinationStore, InMemoryCoordinationStore, ServiceRegistry,
};
use sidecar::Sidecar;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => subscriber.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve<S: CoordinationStore + 'static>(
    config: Config,
    store: S,
    shared_secret: String,
    metrics_handle: PrometheusHandle,
) {
    let registry = ServiceRegistry::new(store)
        .with_namespace(&config.registry_namespace)
        .with_record(service_record(&config.service_name, &config.service_url));
    registry.init().await.expect("failed to register service");
    tracing::info!(
        service = %config.service_name,
        url = %config.service_url,
        namespace = %config.registry_namespace,
        "service registered"
    );

    let sidecar = Sidecar::with_shared_secret(registry, shared_secret);
    let state = Arc::new(AppState::new(sidecar, Arc::new(StagedLedger::new())));
    let app = node::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting node");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("node shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let Some(shared_secret) = config.shared_secret.clone() else {
        tracing::error!("SHARED_SECRET is not set, refusing to start");
        std::process::exit(1);
    };

    // 3. Connect the coordination store and serve
    if config.etcd_endpoints.is_empty() {
        tracing::warn!("ETCD_ENDPOINTS is not set, using an in-process registry");
        serve(
            config,
            InMemoryCoordinationStore::new(),
            shared_secret,
            metrics_handle,
        )
        .await;
    } else {
        let store =
            EtcdCoordinationStore::connect(&config.etcd_endpoints, config.etcd_credentials())
                .await
                .expect("failed to connect to etcd");
        tracing::info!(endpoints = ?config.etcd_endpoints, "connected to etcd");
        serve(config, store, shared_secret, metrics_handle).await;
    }
}
