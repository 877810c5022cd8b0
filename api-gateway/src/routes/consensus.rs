//! `POST /receive_prediction`, `POST /receive_score`, `GET /predictions`,
//! `GET /scores`.

use std::collections::HashMap;

use axum::{Json, extract::State, http::StatusCode};

use chain::protocol::{PredictionMessage, ScoreMessage};

use crate::round_metrics;
use crate::state::SharedState;

/// `POST /receive_prediction`
pub async fn receive_prediction(State(state): State<SharedState>, Json(body): Json<PredictionMessage>) -> StatusCode {
    let mut node = state.node.lock().await;
    let penalties_before = round_metrics::penalty_count(&node);
    if !node.receive_prediction(&body.node_id, body.prediction) {
        round_metrics::record_penalties(&state.metrics, penalties_before, &node);
        return StatusCode::FORBIDDEN;
    }
    round_metrics::record_penalties(&state.metrics, penalties_before, &node);
    if let Err(err) = round_metrics::advance_round(&state.metrics, &mut node) {
        tracing::warn!(error = %err, "advance_round failed after receive_prediction");
    }
    StatusCode::OK
}

/// `POST /receive_score`
///
/// Once both sides' scores have arrived, advancing the round mines and
/// broadcasts the block pair if this node won, restarts it if the score
/// fell outside the validation band, or leaves it pending if the peer won
/// (whose own `/receive_blocks` broadcast will land separately).
pub async fn receive_score(State(state): State<SharedState>, Json(body): Json<ScoreMessage>) -> StatusCode {
    let mut node = state.node.lock().await;
    let penalties_before = round_metrics::penalty_count(&node);
    if !node.receive_score(&body.node_id, body.score) {
        round_metrics::record_penalties(&state.metrics, penalties_before, &node);
        return StatusCode::FORBIDDEN;
    }
    round_metrics::record_penalties(&state.metrics, penalties_before, &node);
    if let Err(err) = round_metrics::advance_round(&state.metrics, &mut node) {
        tracing::warn!(error = %err, "advance_round failed after receive_score");
    }
    StatusCode::OK
}

/// `GET /predictions`
pub async fn get_predictions(State(state): State<SharedState>) -> Json<HashMap<String, u64>> {
    let node = state.node.lock().await;
    Json(node.consensus_predictions().clone())
}

/// `GET /scores`
pub async fn get_scores(State(state): State<SharedState>) -> Json<HashMap<String, i64>> {
    let node = state.node.lock().await;
    Json(node.prediction_scores().clone())
}
