//! Error type for wallet construction, derivation, and signing operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid mnemonic: {0}")]
    Mnemonic(String),
    #[error("key derivation failed: {0}")]
    Derivation(String),
    #[error("invalid transaction hash: {0}")]
    InvalidHash(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("signature verification failed: {0}")]
    Verification(String),
    #[error("invalid recovery key: {0}")]
    RecoveryKey(String),
}
