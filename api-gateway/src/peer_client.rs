//! `reqwest`-backed implementation of `chain::PeerClient`, the one piece
//! of the protocol surface that actually knows about HTTP.

use std::time::Duration;

use chain::node::{NodeError, PeerClient};
use chain::protocol::{
    BlockchainSnapshot, EntanglementRequest, PairKeyMessage, PeerInfo, PeerMap, PredictionMessage,
    ReceiveBlocksMessage, ScoreMessage,
};
use chain::types::Transaction;

/// Blocking `reqwest` client shared across every outbound peer call.
pub struct HttpPeerClient {
    client: reqwest::blocking::Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<Self, NodeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NodeError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn post<T: serde::Serialize>(&self, url: &str, path: &str, body: &T) -> Result<reqwest::blocking::Response, NodeError> {
        self.client
            .post(format!("{url}{path}"))
            .json(body)
            .send()
            .map_err(|e| NodeError::Transport(e.to_string()))
            .and_then(check_status)
    }

    fn get(&self, url: &str, path: &str) -> Result<reqwest::blocking::Response, NodeError> {
        self.client
            .get(format!("{url}{path}"))
            .send()
            .map_err(|e| NodeError::Transport(e.to_string()))
            .and_then(check_status)
    }
}

fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, NodeError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(NodeError::Transport(format!("peer returned status {}", response.status())))
    }
}

impl PeerClient for HttpPeerClient {
    fn node_info(&self, peer_url: &str) -> Result<PeerInfo, NodeError> {
        let response = self.get(peer_url, "/node_info")?;
        response.json().map_err(|e| NodeError::Transport(e.to_string()))
    }

    fn entanglement_request(&self, peer_url: &str, remote_peer_id: &str) -> Result<(), NodeError> {
        self.post(
            peer_url,
            "/entanglement_request",
            &EntanglementRequest { remote_peer_id: remote_peer_id.to_string() },
        )?;
        Ok(())
    }

    fn receive_pair_key(&self, peer_url: &str, key: u64) -> Result<(), NodeError> {
        self.post(peer_url, "/receive_pair_key", &PairKeyMessage { key })?;
        Ok(())
    }

    fn receive_peers(&self, peer_url: &str, peers: &PeerMap) -> Result<(), NodeError> {
        self.post(peer_url, "/receive_peers", peers)?;
        Ok(())
    }

    fn receive_transaction(&self, peer_url: &str, transaction: &Transaction) -> Result<(), NodeError> {
        self.post(peer_url, "/receive_transaction", transaction)?;
        Ok(())
    }

    fn receive_prediction(&self, peer_url: &str, node_id: &str, prediction: u64) -> Result<(), NodeError> {
        self.post(
            peer_url,
            "/receive_prediction",
            &PredictionMessage { node_id: node_id.to_string(), prediction },
        )?;
        Ok(())
    }

    fn receive_score(&self, peer_url: &str, node_id: &str, score: i64) -> Result<(), NodeError> {
        self.post(peer_url, "/receive_score", &ScoreMessage { node_id: node_id.to_string(), score })?;
        Ok(())
    }

    fn receive_blocks(&self, peer_url: &str, message: &ReceiveBlocksMessage) -> Result<(), NodeError> {
        self.post(peer_url, "/receive_blocks", message)?;
        Ok(())
    }

    fn get_blockchain(&self, peer_url: &str) -> Result<BlockchainSnapshot, NodeError> {
        let response = self.get(peer_url, "/blockchain")?;
        response.json().map_err(|e| NodeError::Transport(e.to_string()))
    }
}
