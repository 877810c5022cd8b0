//! Blockchain state: the two linked chains, pending transactions, and
//! account balances.

mod blockchain;
mod error;

pub use blockchain::{Blockchain, DEFAULT_TRANSACTION_LIMIT};
pub use error::ChainError;
