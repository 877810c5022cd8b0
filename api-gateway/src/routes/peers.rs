//! `GET /peers`, `POST /receive_peers`.

use axum::{Json, extract::State, http::StatusCode};

use chain::protocol::PeerMap;

use crate::state::SharedState;

/// `GET /peers`
pub async fn get_peers(State(state): State<SharedState>) -> Json<PeerMap> {
    let node = state.node.lock().await;
    Json(node.peers().clone())
}

/// `POST /receive_peers`
pub async fn receive_peers(State(state): State<SharedState>, Json(peers): Json<PeerMap>) -> StatusCode {
    let mut node = state.node.lock().await;
    node.receive_peers(peers);
    StatusCode::OK
}
