//! `POST /entanglement_request`, `POST /receive_pair_key`.

use axum::{Json, extract::State, http::StatusCode};

use chain::protocol::{EntanglementRequest, PairKeyMessage};

use crate::round_metrics;
use crate::state::SharedState;

/// `POST /entanglement_request`
///
/// Accepts or refuses an inbound pairing request.
pub async fn entanglement_request(
    State(state): State<SharedState>,
    Json(body): Json<EntanglementRequest>,
) -> Result<StatusCode, StatusCode> {
    let mut node = state.node.lock().await;
    let accepted = node.accept_entanglement(&body.remote_peer_id).map_err(|err| {
        tracing::warn!(error = %err, "accept_entanglement failed");
        StatusCode::CONFLICT
    })?;

    if !accepted {
        return Ok(StatusCode::CONFLICT);
    }

    if let Err(err) = round_metrics::advance_round(&state.metrics, &mut node) {
        tracing::warn!(error = %err, "advance_round failed after accepting entanglement");
    }

    Ok(StatusCode::OK)
}

/// `POST /receive_pair_key`
pub async fn receive_pair_key(State(state): State<SharedState>, Json(body): Json<PairKeyMessage>) -> StatusCode {
    let mut node = state.node.lock().await;
    node.receive_key(body.key);
    if let Err(err) = round_metrics::advance_round(&state.metrics, &mut node) {
        tracing::warn!(error = %err, "advance_round failed after receiving pair key");
    }
    StatusCode::OK
}
