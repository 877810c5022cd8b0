//! Chain library crate.
//!
//! This crate provides the core building blocks of an entanglement
//! consensus ledger node:
//!
//! - an HD wallet and recoverable ECDSA signing (`wallet`),
//! - the `Φx`-prefixed domain types: transactions and the two linked
//!   chain elements (`types`),
//! - the stateless entanglement consensus engine (`consensus`),
//! - in-memory chain state: the two chains, mempool, and balances
//!   (`chainstate`),
//! - the peer-to-peer node orchestrator and its `PeerClient` seam
//!   (`node`),
//! - wire-level DTOs for the peer protocol (`protocol`),
//! - Prometheus-based metrics (`metrics`),
//! - and node/wallet configuration (`config`).
//!
//! `api-gateway` composes these pieces into an HTTP-facing node process.

pub mod chainstate;
pub mod config;
pub mod consensus;
pub mod metrics;
pub mod node;
pub mod protocol;
pub mod types;
pub mod wallet;

pub use chainstate::{Blockchain, ChainError, DEFAULT_TRANSACTION_LIMIT};
pub use config::{NodeConfig, WalletConfig};
pub use consensus::{ConsensusError, EntanglementConsensus};
pub use metrics::{MetricsRegistry, NodeMetrics, run_prometheus_http_server};
pub use node::{Node, NodeError, PeerClient, RoundOutcome};
pub use wallet::{Wallet, WalletError};

// Re-export domain types at the crate root for convenience.
pub use types::{Block, CoherenceBlock, PHI_X, Transaction, bare_sha256_hex, hex_digest_mod, phi_sha256};
