//! Error type for blockchain state transitions.

use thiserror::Error;

use crate::wallet::WalletError;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("not enough pending transactions to create a block: have {have}, need {need}")]
    InsufficientTransactions { have: usize, need: usize },
    #[error("genesis block creation failed: {0}")]
    GenesisFailed(String),
    #[error("entanglement between block and coherence block failed")]
    EntanglementFailed,
    #[error("block index {0} out of range")]
    IndexOutOfRange(u64),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}
