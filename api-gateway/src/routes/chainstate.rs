//! `GET /blockchain`.

use axum::{Json, extract::State};

use chain::protocol::BlockchainSnapshot;

use crate::state::SharedState;

/// `GET /blockchain`
pub async fn get_blockchain(State(state): State<SharedState>) -> Json<BlockchainSnapshot> {
    let node = state.node.lock().await;
    Json(node.blockchain_snapshot())
}
