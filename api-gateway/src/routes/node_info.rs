//! `POST /run_node`, `GET /node_info`, `GET /find_pair`, `GET /validate_blockchain`.

use axum::{Json, extract::State, http::StatusCode};

use chain::protocol::NodeSnapshot;

use crate::state::SharedState;

/// `POST /run_node`
///
/// Joins the network through the configured bootstrap node. Idempotent:
/// a second call is a no-op and returns `200 OK` immediately.
pub async fn run_node(State(state): State<SharedState>) -> StatusCode {
    if !state.start_bootstrap() {
        return StatusCode::OK;
    }

    let bootstrap_url = state.config.bootstrap_node_url.clone();
    let mut node = state.node.lock().await;

    if bootstrap_url != node.url() {
        node.register_peer("bootstrap", bootstrap_url);
        node.broadcast_peers();
    }

    if let Err(err) = node.find_pair() {
        tracing::warn!(error = %err, "find_pair failed during run_node");
    }

    StatusCode::OK
}

/// `GET /node_info`
pub async fn node_info(State(state): State<SharedState>) -> Json<NodeSnapshot> {
    let node = state.node.lock().await;
    Json(NodeSnapshot {
        node_id: node.node_id().to_string(),
        ip: node.ip().to_string(),
        port: node.port(),
        url: node.url().to_string(),
        peers: node.peers().clone(),
        entangled_pair_id: node.entangled_pair_id().map(str::to_string),
        key: node.key(),
        entangled_pair_key: node.entangled_pair_key(),
        consensus_predictions: node.consensus_predictions().clone(),
        prediction_scores: node.prediction_scores().clone(),
        actual_block: node.actual_block().cloned(),
        actual_coherence_block: node.actual_coherence_block().cloned(),
        actual_entangled_hash: node.actual_entangled_hash().map(str::to_string),
        penalized_nodes: node.penalized_nodes().clone(),
        times_that_nodes_were_penalized: node.times_that_nodes_were_penalized().clone(),
        max_penalization_time: node.max_penalization_time(),
        max_penalties: node.max_penalties(),
    })
}

/// `GET /find_pair`
///
/// Attempts to find and request entanglement with an unpaired peer.
/// Returns the chosen peer id, or `404` if this node is already paired
/// or no unpaired peer could be found.
pub async fn find_pair(State(state): State<SharedState>) -> Result<Json<String>, StatusCode> {
    let mut node = state.node.lock().await;
    match node.find_pair() {
        Ok(Some(peer_id)) => Ok(Json(peer_id)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(err) => {
            tracing::warn!(error = %err, "find_pair failed");
            Err(StatusCode::CONFLICT)
        }
    }
}

/// `GET /validate_blockchain`
pub async fn validate_blockchain(State(state): State<SharedState>) -> Json<bool> {
    let mut node = state.node.lock().await;
    Json(node.validate_blockchain())
}
