//! Error type for the consensus engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("chain validation failed: {0}")]
    Validation(String),
    #[error("invalid entanglement hash")]
    InvalidEntanglement,
    #[error("invalid prediction score")]
    InvalidScore,
}
