// api-gateway/src/main.rs

//! API gateway binary.
//!
//! Hosts a single entanglement-consensus ledger node: peer registry, pair
//! discovery, the per-round prediction/score protocol, block commit and
//! propagation, and chain queries, as a small Axum HTTP surface plus a
//! Prometheus `/metrics` exporter.

mod config;
mod peer_client;
mod round_metrics;
mod routes;
mod state;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;

use chain::{MetricsRegistry, Node, NodeConfig, run_prometheus_http_server};
use config::ApiConfig;
use peer_client::HttpPeerClient;
use routes::{blocks, chainstate, consensus, entanglement, node_info, peers, transactions};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "api_gateway=info,chain=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::default();
    let node_cfg = NodeConfig::default();

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    {
        let metrics_clone = metrics.clone();
        let addr = api_cfg.metrics_listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Node
    // ---------------------------

    let peer_client = HttpPeerClient::new(node_cfg.peer_call_timeout)
        .map_err(|e| format!("failed to build HttpPeerClient: {e}"))?;

    let node = Node::new(api_cfg.node_id.clone(), api_cfg.node_ip.clone(), api_cfg.node_port, node_cfg, peer_client)
        .map_err(|e| format!("failed to initialise node: {e}"))?;

    let app_state: SharedState = Arc::new(AppState {
        node: tokio::sync::Mutex::new(node),
        metrics,
        config: api_cfg.clone(),
        bootstrapped: AtomicBool::new(false),
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/run_node", post(node_info::run_node))
        .route("/node_info", get(node_info::node_info))
        .route("/find_pair", get(node_info::find_pair))
        .route("/validate_blockchain", get(node_info::validate_blockchain))
        .route("/peers", get(peers::get_peers))
        .route("/receive_peers", post(peers::receive_peers))
        .route("/entanglement_request", post(entanglement::entanglement_request))
        .route("/receive_pair_key", post(entanglement::receive_pair_key))
        .route("/add_transaction", post(transactions::add_transaction))
        .route("/transactions", get(transactions::get_transactions))
        .route("/receive_transaction", post(transactions::receive_transaction))
        .route("/receive_prediction", post(consensus::receive_prediction))
        .route("/receive_score", post(consensus::receive_score))
        .route("/predictions", get(consensus::get_predictions))
        .route("/scores", get(consensus::get_scores))
        .route("/receive_blocks", post(blocks::receive_blocks))
        .route("/block/{hash}", get(blocks::get_block))
        .route("/coherence_block/{hash}", get(blocks::get_coherence_block))
        .route("/blockchain", get(chainstate::get_blockchain))
        .with_state(app_state);

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
