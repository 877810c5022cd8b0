//! The transport-agnostic seam between the orchestrator and the network.
//!
//! Mirrors the teacher's `MlVerifier`/`HttpMlVerifier` split: `PeerClient`
//! is a plain, blocking trait so the orchestrator never depends on any
//! particular HTTP stack. The concrete `HttpPeerClient` (reqwest-backed,
//! enforcing the 5-second call timeout from §5) lives in `api-gateway`.

use crate::protocol::{BlockchainSnapshot, PeerInfo, ReceiveBlocksMessage};
use crate::types::Transaction;

use super::error::NodeError;

/// Outbound calls the orchestrator makes to a single peer, by URL.
///
/// Every method is expected to enforce its own timeout and convert
/// transport failures into `NodeError::Transport` rather than panicking;
/// callers log and continue rather than treat these as fatal (§5, §7).
pub trait PeerClient: Send + Sync {
    fn node_info(&self, peer_url: &str) -> Result<PeerInfo, NodeError>;
    fn entanglement_request(&self, peer_url: &str, remote_peer_id: &str) -> Result<(), NodeError>;
    fn receive_pair_key(&self, peer_url: &str, key: u64) -> Result<(), NodeError>;
    fn receive_peers(&self, peer_url: &str, peers: &crate::protocol::PeerMap) -> Result<(), NodeError>;
    fn receive_transaction(&self, peer_url: &str, transaction: &Transaction) -> Result<(), NodeError>;
    fn receive_prediction(&self, peer_url: &str, node_id: &str, prediction: u64) -> Result<(), NodeError>;
    fn receive_score(&self, peer_url: &str, node_id: &str, score: i64) -> Result<(), NodeError>;
    fn receive_blocks(&self, peer_url: &str, message: &ReceiveBlocksMessage) -> Result<(), NodeError>;
    fn get_blockchain(&self, peer_url: &str) -> Result<BlockchainSnapshot, NodeError>;
}

#[cfg(test)]
pub mod fake {
    //! An in-process `PeerClient` stand-in for orchestrator unit tests.
    //! Records every call and serves canned responses, analogous to the
    //! teacher's `InMemoryBlockStore`.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakePeerClient {
        pub node_infos: Mutex<HashMap<String, PeerInfo>>,
        pub blockchains: Mutex<HashMap<String, BlockchainSnapshot>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakePeerClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_node_info(&self, peer_url: &str, info: PeerInfo) {
            self.node_infos.lock().unwrap().insert(peer_url.to_string(), info);
        }

        pub fn set_blockchain(&self, peer_url: &str, snapshot: BlockchainSnapshot) {
            self.blockchains.lock().unwrap().insert(peer_url.to_string(), snapshot);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn log(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    impl PeerClient for FakePeerClient {
        fn node_info(&self, peer_url: &str) -> Result<PeerInfo, NodeError> {
            self.log(format!("node_info:{peer_url}"));
            self.node_infos
                .lock()
                .unwrap()
                .get(peer_url)
                .cloned()
                .ok_or_else(|| NodeError::Transport(format!("no fake node_info for {peer_url}")))
        }

        fn entanglement_request(&self, peer_url: &str, remote_peer_id: &str) -> Result<(), NodeError> {
            self.log(format!("entanglement_request:{peer_url}:{remote_peer_id}"));
            Ok(())
        }

        fn receive_pair_key(&self, peer_url: &str, key: u64) -> Result<(), NodeError> {
            self.log(format!("receive_pair_key:{peer_url}:{key}"));
            Ok(())
        }

        fn receive_peers(&self, peer_url: &str, _peers: &crate::protocol::PeerMap) -> Result<(), NodeError> {
            self.log(format!("receive_peers:{peer_url}"));
            Ok(())
        }

        fn receive_transaction(&self, peer_url: &str, _transaction: &Transaction) -> Result<(), NodeError> {
            self.log(format!("receive_transaction:{peer_url}"));
            Ok(())
        }

        fn receive_prediction(&self, peer_url: &str, node_id: &str, prediction: u64) -> Result<(), NodeError> {
            self.log(format!("receive_prediction:{peer_url}:{node_id}:{prediction}"));
            Ok(())
        }

        fn receive_score(&self, peer_url: &str, node_id: &str, score: i64) -> Result<(), NodeError> {
            self.log(format!("receive_score:{peer_url}:{node_id}:{score}"));
            Ok(())
        }

        fn receive_blocks(&self, peer_url: &str, _message: &ReceiveBlocksMessage) -> Result<(), NodeError> {
            self.log(format!("receive_blocks:{peer_url}"));
            Ok(())
        }

        fn get_blockchain(&self, peer_url: &str) -> Result<BlockchainSnapshot, NodeError> {
            self.log(format!("get_blockchain:{peer_url}"));
            self.blockchains
                .lock()
                .unwrap()
                .get(peer_url)
                .cloned()
                .ok_or_else(|| NodeError::Transport(format!("no fake blockchain for {peer_url}")))
        }
    }
}
