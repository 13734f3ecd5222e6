// api-gateway/src/main.rs

//! Gateway binary.
//!
//! This binary exposes a small HTTP API on top of the `pot-chain` crate:
//!
//! - `GET /health`
//! - `POST /messages`
//! - `GET /chain`
//! - `GET /state`
//!
//! It embeds one Proof-of-Turn node over an in-process bus (a
//! single-member network by default, so the node perpetually holds the
//! turn) and a Prometheus metrics exporter on `/metrics`.

mod config;
mod routes;
mod state;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;

use pot_chain::{
    InProcessBus, Membership, MetricsRegistry, Node, NodeConfig, Transport, crypto,
    run_prometheus_http_server,
};

use config::ApiConfig;
use routes::{chain, health, messages};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "pot_gateway=info,pot_chain=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    // For now we use default configs. These can be externalised later.
    let api_cfg = ApiConfig::default();
    let node_cfg = NodeConfig::default();

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    // Metrics exporter.
    if node_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = node_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::warn!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Node identity + membership
    // ---------------------------

    let node_id = api_cfg.node_id.clone();
    let (public_key, signing_key) = crypto::generate_keypair();
    let membership = Membership::new(
        vec![node_id.clone()],
        HashMap::from([(node_id.clone(), public_key)]),
    );

    // ---------------------------
    // Bus + embedded node
    // ---------------------------

    let bus = Arc::new(InProcessBus::default());
    let (node, _task) = Node::spawn(
        node_id,
        membership,
        signing_key,
        node_cfg.turn.clone(),
        bus.clone() as Arc<dyn Transport>,
        metrics.clone(),
    );

    // ---------------------------
    // Shared state
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState { node: node.clone() });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/messages", post(messages::send_message))
        .route("/chain", get(chain::get_chain))
        .route("/state", get(chain::get_state))
        .with_state(app_state);

    // ---------------------------
    // axum 0.8 server (hyper 1 style)
    // ---------------------------

    tracing::info!("gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    // Stop the node's event loop before exiting.
    if let Err(e) = node.shutdown().await {
        tracing::warn!("node shutdown failed: {e}");
    }

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
