//! Wire-level DTOs for the peer protocol named in §6 of the node's
//! external interface. Every hash/address string inside these shapes
//! carries the `Φx` marker produced by [`crate::types`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::chainstate::Blockchain;
use crate::types::{Block, CoherenceBlock, Transaction};

/// `peer_id -> url`, the shape carried by `/peers` and `/receive_peers`.
pub type PeerMap = HashMap<String, String>;

/// The subset of a peer's `/node_info` response this node actually reads:
/// whether the peer is already entangled with someone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerInfo {
    pub node_id: String,
    #[serde(default)]
    pub entangled_pair_id: Option<String>,
}

/// Full snapshot returned by `/node_info`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_id: String,
    pub ip: String,
    pub port: u16,
    pub url: String,
    pub peers: PeerMap,
    pub entangled_pair_id: Option<String>,
    pub key: Option<u64>,
    pub entangled_pair_key: Option<u64>,
    pub consensus_predictions: HashMap<String, u64>,
    pub prediction_scores: HashMap<String, i64>,
    pub actual_block: Option<Block>,
    pub actual_coherence_block: Option<CoherenceBlock>,
    pub actual_entangled_hash: Option<String>,
    pub penalized_nodes: HashMap<String, u64>,
    pub times_that_nodes_were_penalized: HashMap<String, u32>,
    pub max_penalization_time: u64,
    pub max_penalties: u32,
}

/// Body of `/entanglement_request`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntanglementRequest {
    pub remote_peer_id: String,
}

/// Body of `/receive_pair_key`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PairKeyMessage {
    pub key: u64,
}

/// Body of `/receive_prediction`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredictionMessage {
    pub node_id: String,
    pub prediction: u64,
}

/// Body of `/receive_score`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreMessage {
    pub node_id: String,
    pub score: i64,
}

/// Body of `/receive_blocks`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReceiveBlocksMessage {
    pub block: Block,
    pub coherence_block: CoherenceBlock,
    pub entangled_hash: String,
    pub node_id: String,
}

/// The typed shape `/blockchain` serves and `sync_blockchain` deserializes
/// peer payloads into, rather than treating them as loosely-typed JSON
/// (open question 4).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BlockchainSnapshot {
    pub chain: Vec<Block>,
    pub coherence_chain: Vec<CoherenceBlock>,
    pub entangled_blocks: HashMap<String, (Block, CoherenceBlock)>,
    pub current_chain_index: u64,
    pub current_coherence_chain_index: u64,
    pub pending_transactions: Vec<Transaction>,
    pub transaction_limit: usize,
}

impl From<&Blockchain> for BlockchainSnapshot {
    fn from(blockchain: &Blockchain) -> Self {
        Self {
            chain: blockchain.chain.clone(),
            coherence_chain: blockchain.coherence_chain.clone(),
            entangled_blocks: blockchain.entangled_blocks.clone(),
            current_chain_index: blockchain.current_chain_index,
            current_coherence_chain_index: blockchain.current_coherence_chain_index,
            pending_transactions: blockchain.pending_transactions.clone(),
            transaction_limit: blockchain.transaction_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blockchain_snapshot_round_trips_through_json() {
        let blockchain = Blockchain::new(4).unwrap();
        let snapshot = BlockchainSnapshot::from(&blockchain);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: BlockchainSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, back);
    }
}
