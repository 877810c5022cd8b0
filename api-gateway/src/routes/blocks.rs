//! `POST /receive_blocks`, `GET /block/{hash}`, `GET /coherence_block/{hash}`.

use axum::{Json, extract::{Path, State}, http::StatusCode};

use chain::protocol::ReceiveBlocksMessage;
use chain::types::{Block, CoherenceBlock};

use crate::state::SharedState;

/// `POST /receive_blocks`
pub async fn receive_blocks(State(state): State<SharedState>, Json(body): Json<ReceiveBlocksMessage>) -> StatusCode {
    let mut node = state.node.lock().await;
    let accepted = node.receive_blocks(body.block, body.coherence_block, body.entangled_hash, &body.node_id);
    if accepted { StatusCode::OK } else { StatusCode::CONFLICT }
}

/// `GET /block/{hash}`
pub async fn get_block(State(state): State<SharedState>, Path(hash): Path<String>) -> Result<Json<Block>, StatusCode> {
    let node = state.node.lock().await;
    node.get_block(&hash).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// `GET /coherence_block/{hash}`
pub async fn get_coherence_block(
    State(state): State<SharedState>,
    Path(hash): Path<String>,
) -> Result<Json<CoherenceBlock>, StatusCode> {
    let node = state.node.lock().await;
    node.get_coherence_block(&hash).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}
