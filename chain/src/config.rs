//! Top-level configuration for a chain node.
//!
//! This module aggregates configuration for:
//!
//! - the node orchestrator (mempool size, peer penalty thresholds, call
//!   timeout, quorum rule),
//! - wallet derivation (BIP-44 account/index, PBKDF2 round count).
//!
//! The goal is to have small, `Default`-able structs that higher-level
//! binaries (e.g. `api-gateway`'s `main.rs`) can construct from defaults,
//! config files, or environment variables as needed.

use std::time::Duration;

/// Configuration for the node orchestrator.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Number of pending transactions required before a block is proposed.
    pub transaction_limit: usize,
    /// How long a peer penalty lasts before it is cleared automatically.
    pub max_penalization_time: u64,
    /// Number of penalties a peer can accrue before its messages are
    /// dropped permanently.
    pub max_penalties: u32,
    /// Timeout applied to every outbound peer call.
    pub peer_call_timeout: Duration,
}

impl NodeConfig {
    /// The minimum number of peers that must corroborate a chain before
    /// `sync_blockchain` adopts it: `max(2, peers / 2)`.
    pub fn quorum_min(&self, peer_count: usize) -> usize {
        (peer_count / 2).max(2)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            transaction_limit: crate::chainstate::DEFAULT_TRANSACTION_LIMIT,
            max_penalization_time: 600,
            max_penalties: 3,
            peer_call_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for wallet key derivation.
#[derive(Clone, Debug)]
pub struct WalletConfig {
    /// BIP-44 account index.
    pub account: u32,
    /// BIP-44 address index within the account.
    pub index: u32,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self { account: 0, index: 0 }
    }
}
