//! `POST /add_transaction`, `GET /transactions`, `POST /receive_transaction`.

use axum::{Json, extract::State, http::StatusCode};

use chain::types::Transaction;

use crate::round_metrics;
use crate::state::SharedState;

/// `POST /add_transaction`
///
/// Queues a transaction locally, broadcasts it to peers, and advances the
/// round state machine (a no-op until the mempool reaches the limit).
pub async fn add_transaction(State(state): State<SharedState>, Json(transaction): Json<Transaction>) -> StatusCode {
    let mut node = state.node.lock().await;
    node.broadcast_transaction(&transaction);
    node.add_transaction(transaction);
    if let Err(err) = round_metrics::advance_round(&state.metrics, &mut node) {
        tracing::warn!(error = %err, "advance_round failed after add_transaction");
    }
    StatusCode::ACCEPTED
}

/// `GET /transactions`
pub async fn get_transactions(State(state): State<SharedState>) -> Json<Vec<Transaction>> {
    let node = state.node.lock().await;
    Json(node.blockchain().pending_transactions.clone())
}

/// `POST /receive_transaction`
pub async fn receive_transaction(State(state): State<SharedState>, Json(transaction): Json<Transaction>) -> StatusCode {
    let mut node = state.node.lock().await;
    node.add_transaction(transaction);
    if let Err(err) = round_metrics::advance_round(&state.metrics, &mut node) {
        tracing::warn!(error = %err, "advance_round failed after receive_transaction");
    }
    StatusCode::OK
}
