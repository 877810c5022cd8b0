//! Error type for the node orchestrator.

use thiserror::Error;

use crate::chainstate::ChainError;
use crate::wallet::WalletError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node is already entangled with a pair")]
    AlreadyPaired,
    #[error("peer {0} is not in the peer table")]
    PeerUnknown(String),
    #[error("node is not entangled with a pair yet")]
    Uninitialized,
    #[error("peer call failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}
