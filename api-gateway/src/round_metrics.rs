//! Times and records round-level activity against the shared Prometheus
//! registry, mirroring how the block producer loop in the teacher's
//! gateway times `propose_block` and observes the result.

use std::time::Instant;

use chain::{MetricsRegistry, NodeError, RoundOutcome};

use crate::state::DefaultNode;

/// Sum of `node`'s penalty table, used as a before/after snapshot around a
/// call that may penalize a peer (`receive_prediction`, `receive_score`).
pub fn penalty_count(node: &DefaultNode) -> u32 {
    node.times_that_nodes_were_penalized().values().sum()
}

/// Bumps `messages_penalized` by however many new penalties were issued
/// since `before` was taken.
pub fn record_penalties(metrics: &MetricsRegistry, before: u32, node: &DefaultNode) {
    let after = penalty_count(node);
    if after > before {
        metrics.node.messages_penalized.inc_by((after - before) as u64);
    }
}

/// Advances the round state machine on `node`, observing `round_seconds`
/// for the call and bumping `blocks_committed`/`rounds_retried` from the
/// outcome.
pub fn advance_round(metrics: &MetricsRegistry, node: &mut DefaultNode) -> Result<RoundOutcome, NodeError> {
    let start = Instant::now();
    let outcome = node.advance_round();
    metrics.node.round_seconds.observe(start.elapsed().as_secs_f64());

    match &outcome {
        Ok(RoundOutcome::Won) => metrics.node.blocks_committed.inc(),
        Ok(RoundOutcome::Retry) => metrics.node.rounds_retried.inc(),
        _ => {}
    }

    outcome
}
