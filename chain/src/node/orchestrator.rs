//! The node orchestrator: peer registry, pair discovery, the per-round
//! entanglement key exchange, the consensus state machine, and longest-chain
//! sync. Everything here is synchronous and expects a single caller at a
//! time; `api-gateway` is responsible for the single-writer discipline
//! (serializing handler access behind a lock).

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::chainstate::Blockchain;
use crate::config::NodeConfig;
use crate::consensus::EntanglementConsensus;
use crate::protocol::{BlockchainSnapshot, PeerMap, ReceiveBlocksMessage};
use crate::types::{Block, CoherenceBlock, Transaction};
use crate::wallet::Wallet;

use super::error::NodeError;
use super::peer_client::PeerClient;

/// Outcome of feeding this round's prediction and score through the
/// consensus state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum RoundOutcome {
    /// Waiting on more predictions or scores from the paired peer.
    Pending,
    /// This node's score won the round; the block pair was committed.
    Won,
    /// The paired peer's score won; nothing to commit locally.
    Lost,
    /// The score failed validation; the round must restart from key
    /// generation.
    Retry,
}

/// A single ledger node: wallet-agnostic chain state plus the peer-to-peer
/// bookkeeping needed to run the entanglement consensus protocol.
pub struct Node<C: PeerClient> {
    node_id: String,
    ip: String,
    port: u16,
    url: String,
    config: NodeConfig,
    peer_client: C,
    consensus: EntanglementConsensus,
    blockchain: Blockchain,

    peers: PeerMap,
    entangled_pair_id: Option<String>,
    key: Option<u64>,
    entangled_pair_key: Option<u64>,

    consensus_predictions: HashMap<String, u64>,
    prediction_scores: HashMap<String, i64>,
    actual_block: Option<Block>,
    actual_coherence_block: Option<CoherenceBlock>,
    actual_entangled_hash: Option<String>,

    penalized_nodes: HashMap<String, u64>,
    times_that_nodes_were_penalized: HashMap<String, u32>,
}

impl<C: PeerClient> Node<C> {
    pub fn new(
        node_id: impl Into<String>,
        ip: impl Into<String>,
        port: u16,
        config: NodeConfig,
        peer_client: C,
    ) -> Result<Self, NodeError> {
        let node_id = node_id.into();
        let ip = ip.into();
        let url = format!("http://{ip}:{port}");
        let blockchain = Blockchain::new(config.transaction_limit)?;
        Ok(Self {
            node_id,
            ip,
            port,
            url,
            config,
            peer_client,
            consensus: EntanglementConsensus,
            blockchain,
            peers: PeerMap::new(),
            entangled_pair_id: None,
            key: None,
            entangled_pair_key: None,
            consensus_predictions: HashMap::new(),
            prediction_scores: HashMap::new(),
            actual_block: None,
            actual_coherence_block: None,
            actual_entangled_hash: None,
            penalized_nodes: HashMap::new(),
            times_that_nodes_were_penalized: HashMap::new(),
        })
    }

    // Accessors

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn peers(&self) -> &PeerMap {
        &self.peers
    }

    pub fn entangled_pair_id(&self) -> Option<&str> {
        self.entangled_pair_id.as_deref()
    }

    pub fn key(&self) -> Option<u64> {
        self.key
    }

    pub fn entangled_pair_key(&self) -> Option<u64> {
        self.entangled_pair_key
    }

    pub fn consensus_predictions(&self) -> &HashMap<String, u64> {
        &self.consensus_predictions
    }

    pub fn prediction_scores(&self) -> &HashMap<String, i64> {
        &self.prediction_scores
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn penalized_nodes(&self) -> &HashMap<String, u64> {
        &self.penalized_nodes
    }

    pub fn times_that_nodes_were_penalized(&self) -> &HashMap<String, u32> {
        &self.times_that_nodes_were_penalized
    }

    pub fn actual_block(&self) -> Option<&Block> {
        self.actual_block.as_ref()
    }

    pub fn actual_coherence_block(&self) -> Option<&CoherenceBlock> {
        self.actual_coherence_block.as_ref()
    }

    pub fn actual_entangled_hash(&self) -> Option<&str> {
        self.actual_entangled_hash.as_deref()
    }

    pub fn max_penalization_time(&self) -> u64 {
        self.config.max_penalization_time
    }

    pub fn max_penalties(&self) -> u32 {
        self.config.max_penalties
    }

    // Peer registry

    pub fn register_peer(&mut self, peer_id: impl Into<String>, url: impl Into<String>) {
        let peer_id = peer_id.into();
        if peer_id != self.node_id {
            self.peers.insert(peer_id, url.into());
        }
    }

    /// Pushes the local peer table to every known peer, logging and
    /// continuing past any that are unreachable.
    pub fn broadcast_peers(&self) {
        for (peer_id, url) in &self.peers {
            if let Err(err) = self.peer_client.receive_peers(url, &self.peers) {
                tracing::warn!(peer = %peer_id, %url, error = %err, "failed to broadcast peer table");
            }
        }
    }

    pub fn receive_peers(&mut self, incoming: PeerMap) {
        for (peer_id, url) in incoming {
            self.register_peer(peer_id, url);
        }
    }

    // Pair discovery

    /// Queries every known peer's `/node_info`, collects those not yet
    /// entangled, and sends an entanglement request to one chosen at
    /// random. Returns the chosen peer id, or `None` if nobody is free.
    pub fn find_pair(&mut self) -> Result<Option<String>, NodeError> {
        if self.entangled_pair_id.is_some() {
            return Err(NodeError::AlreadyPaired);
        }

        let mut candidates = Vec::new();
        for (peer_id, url) in &self.peers {
            match self.peer_client.node_info(url) {
                Ok(info) if info.entangled_pair_id.is_none() => candidates.push(peer_id.clone()),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(peer = %peer_id, %url, error = %err, "node_info failed during pair discovery");
                }
            }
        }

        if candidates.is_empty() {
            return Ok(None);
        }

        let chosen = candidates.remove(rand::thread_rng().gen_range(0..candidates.len()));
        self.send_entanglement_request(&chosen)?;
        Ok(Some(chosen))
    }

    fn send_entanglement_request(&mut self, peer_id: &str) -> Result<(), NodeError> {
        let url = self
            .peers
            .get(peer_id)
            .ok_or_else(|| NodeError::PeerUnknown(peer_id.to_string()))?
            .clone();
        self.entangled_pair_id = Some(peer_id.to_string());
        if let Err(err) = self.peer_client.entanglement_request(&url, &self.node_id) {
            tracing::warn!(peer = %peer_id, %url, error = %err, "entanglement_request failed");
        }
        Ok(())
    }

    /// Responds to an inbound `/entanglement_request`. Calls back to the
    /// requester's `/node_info` to confirm it actually points at this node
    /// before accepting, preventing a stale or mistargeted request from
    /// pairing two nodes that disagree about who they are paired with.
    pub fn accept_entanglement(&mut self, requester_id: &str) -> Result<bool, NodeError> {
        if self.entangled_pair_id.is_some() {
            return Ok(false);
        }
        let url = self
            .peers
            .get(requester_id)
            .ok_or_else(|| NodeError::PeerUnknown(requester_id.to_string()))?
            .clone();

        let confirmed = match self.peer_client.node_info(&url) {
            Ok(info) => info.entangled_pair_id.as_deref() == Some(self.node_id.as_str()),
            Err(err) => {
                tracing::warn!(peer = %requester_id, %url, error = %err, "node_info failed while accepting entanglement");
                false
            }
        };

        if confirmed {
            self.entangled_pair_id = Some(requester_id.to_string());
        }
        Ok(confirmed)
    }

    // Per-round key exchange

    pub fn generate_entanglement_key(&mut self) -> Result<u64, NodeError> {
        let pair_id = self.entangled_pair_id.clone().ok_or(NodeError::Uninitialized)?;
        let key = generate_round_key(&self.node_id, &pair_id);
        self.key = Some(key);
        Ok(key)
    }

    pub fn broadcast_key(&self) -> Result<(), NodeError> {
        let pair_id = self.entangled_pair_id.as_deref().ok_or(NodeError::Uninitialized)?;
        let key = self.key.ok_or(NodeError::Uninitialized)?;
        let url = self
            .peers
            .get(pair_id)
            .ok_or_else(|| NodeError::PeerUnknown(pair_id.to_string()))?;
        if let Err(err) = self.peer_client.receive_pair_key(url, key) {
            tracing::warn!(peer = %pair_id, %url, error = %err, "receive_pair_key failed");
        }
        Ok(())
    }

    pub fn receive_key(&mut self, key: u64) {
        self.entangled_pair_key = Some(key);
    }

    /// Drives the round state machine one step from wherever it currently
    /// stands: starts key exchange once the mempool is full, stages the
    /// candidate block pair once both round keys are known (so its
    /// `coherence_key` exists before scoring needs it), generates and
    /// broadcasts this node's prediction, then its score, and finally
    /// evaluates the round once both scores are in.
    ///
    /// Idempotent and safe to call after every inbound/outbound round
    /// event; each stage only fires once its own precondition newly holds.
    pub fn advance_round(&mut self) -> Result<RoundOutcome, NodeError> {
        let Some(pair_id) = self.entangled_pair_id.clone() else {
            return Ok(RoundOutcome::Pending);
        };
        let mempool_full = self.blockchain.pending_transactions.len() >= self.blockchain.transaction_limit;

        if self.key.is_none() {
            if !mempool_full {
                return Ok(RoundOutcome::Pending);
            }
            self.generate_entanglement_key()?;
            self.broadcast_key()?;
        }

        if self.entangled_pair_key.is_none() {
            return Ok(RoundOutcome::Pending);
        }

        if self.actual_block.is_none() {
            self.generate_blocks(&pair_id)?;
        }

        if !self.consensus_predictions.contains_key(&self.node_id) {
            let prediction = self.generate_prediction();
            self.broadcast_prediction(prediction)?;
        }
        if !self.consensus_predictions.contains_key(&pair_id) {
            return Ok(RoundOutcome::Pending);
        }

        if !self.prediction_scores.contains_key(&self.node_id) {
            let coherence_key = self
                .actual_coherence_block
                .as_ref()
                .ok_or(NodeError::Uninitialized)?
                .coherence_key;
            if let Some(score) = self.set_score(coherence_key)? {
                self.broadcast_score(score)?;
            } else {
                self.clear_round();
                return Ok(RoundOutcome::Retry);
            }
        }
        if !self.prediction_scores.contains_key(&pair_id) {
            return Ok(RoundOutcome::Pending);
        }

        let outcome = self.evaluate_round()?;
        if outcome == RoundOutcome::Won {
            self.mine_blocks()?;
        } else if outcome == RoundOutcome::Retry {
            self.clear_round();
        }
        Ok(outcome)
    }

    // Mempool

    /// Queues a transaction. Returns `true` once the mempool has reached
    /// `transaction_limit`, signalling the caller to start a prediction
    /// round.
    pub fn add_transaction(&mut self, transaction: Transaction) -> bool {
        self.blockchain.pending_transactions.push(transaction);
        self.blockchain.pending_transactions.len() >= self.blockchain.transaction_limit
    }

    pub fn restart_transactions(&mut self) {
        self.blockchain.restart_transactions();
    }

    pub fn broadcast_transaction(&self, transaction: &Transaction) {
        for (peer_id, url) in &self.peers {
            if let Err(err) = self.peer_client.receive_transaction(url, transaction) {
                tracing::warn!(peer = %peer_id, %url, error = %err, "failed to broadcast transaction");
            }
        }
    }

    // Predictions and scores

    /// Generates this node's prediction for the round and records it
    /// locally under its own id.
    pub fn generate_prediction(&mut self) -> u64 {
        let pair_id = self.entangled_pair_id.clone().unwrap_or_default();
        let prediction = self.consensus.generate_node_prediction(&self.node_id, &pair_id);
        self.consensus_predictions.insert(self.node_id.clone(), prediction);
        prediction
    }

    pub fn broadcast_prediction(&self, prediction: u64) -> Result<(), NodeError> {
        let pair_id = self.entangled_pair_id.as_deref().ok_or(NodeError::Uninitialized)?;
        let url = self
            .peers
            .get(pair_id)
            .ok_or_else(|| NodeError::PeerUnknown(pair_id.to_string()))?;
        if let Err(err) = self.peer_client.receive_prediction(url, &self.node_id, prediction) {
            tracing::warn!(peer = %pair_id, %url, error = %err, "failed to broadcast prediction");
        }
        Ok(())
    }

    /// Records an inbound prediction from the paired peer, applying the
    /// penalty rule: a peer that broadcasts a prediction before this
    /// node's own mempool has reached the transaction limit is penalized.
    pub fn receive_prediction(&mut self, node_id: &str, prediction: u64) -> bool {
        if !self.accept_from(node_id) {
            return false;
        }
        if self.blockchain.pending_transactions.len() < self.blockchain.transaction_limit {
            self.penalize(node_id);
        }
        self.consensus_predictions.insert(node_id.to_string(), prediction);
        true
    }

    /// Computes this round's score from the two predictions and round
    /// keys, or `None` if the round must restart (score out of tolerance).
    pub fn set_score(&mut self, coherence_key: u64) -> Result<Option<i64>, NodeError> {
        let pair_id = self.entangled_pair_id.clone().ok_or(NodeError::Uninitialized)?;
        let node_prediction = *self
            .consensus_predictions
            .get(&self.node_id)
            .ok_or(NodeError::Uninitialized)?;
        let pair_prediction = *self.consensus_predictions.get(&pair_id).ok_or(NodeError::Uninitialized)?;
        let node_key = self.key.ok_or(NodeError::Uninitialized)?;
        let pair_key = self.entangled_pair_key.ok_or(NodeError::Uninitialized)?;

        let score = self
            .consensus
            .prediction_score(node_prediction, pair_prediction, node_key, pair_key, coherence_key);
        if let Some(score) = score {
            self.prediction_scores.insert(self.node_id.clone(), score);
        }
        Ok(score)
    }

    pub fn broadcast_score(&self, score: i64) -> Result<(), NodeError> {
        let pair_id = self.entangled_pair_id.as_deref().ok_or(NodeError::Uninitialized)?;
        let url = self
            .peers
            .get(pair_id)
            .ok_or_else(|| NodeError::PeerUnknown(pair_id.to_string()))?;
        if let Err(err) = self.peer_client.receive_score(url, &self.node_id, score) {
            tracing::warn!(peer = %pair_id, %url, error = %err, "failed to broadcast score");
        }
        Ok(())
    }

    /// Records an inbound score, applying the same penalty rule as
    /// [`Self::receive_prediction`].
    pub fn receive_score(&mut self, node_id: &str, score: i64) -> bool {
        if !self.accept_from(node_id) {
            return false;
        }
        if self.blockchain.pending_transactions.len() < self.blockchain.transaction_limit {
            self.penalize(node_id);
        }
        self.prediction_scores.insert(node_id.to_string(), score);
        true
    }

    /// Once both this node's and the pair's scores are in, decides the
    /// round outcome and stages (but does not commit) the winning block
    /// pair.
    pub fn evaluate_round(&mut self) -> Result<RoundOutcome, NodeError> {
        let pair_id = self.entangled_pair_id.clone().ok_or(NodeError::Uninitialized)?;
        let own_score = match self.prediction_scores.get(&self.node_id) {
            Some(s) => *s,
            None => return Ok(RoundOutcome::Pending),
        };
        let pair_score = match self.prediction_scores.get(&pair_id) {
            Some(s) => *s,
            None => return Ok(RoundOutcome::Pending),
        };

        let ordered = vec![(self.node_id.clone(), own_score), (pair_id.clone(), pair_score)];
        let winner = self.consensus.find_best_prediction_score(&ordered);

        match winner {
            Some(id) if id == self.node_id => {
                if self.actual_block.is_none() {
                    self.generate_blocks(&pair_id)?;
                }
                Ok(RoundOutcome::Won)
            }
            Some(_) => Ok(RoundOutcome::Lost),
            None => Ok(RoundOutcome::Retry),
        }
    }

    fn generate_blocks(&mut self, pair_id: &str) -> Result<(), NodeError> {
        let node_key = self.key.ok_or(NodeError::Uninitialized)?;
        let pair_key = self.entangled_pair_key.ok_or(NodeError::Uninitialized)?;
        let (block, coherence_block, entangled_hash) =
            self.blockchain.create_block(&self.node_id, pair_id, node_key, pair_key)?;
        if !self.consensus.is_valid_block(&block, &coherence_block, &entangled_hash) {
            return Err(NodeError::Chain(crate::chainstate::ChainError::EntanglementFailed));
        }
        self.actual_block = Some(block);
        self.actual_coherence_block = Some(coherence_block);
        self.actual_entangled_hash = Some(entangled_hash);
        Ok(())
    }

    /// Commits the staged block pair, clears the round, and broadcasts it
    /// to every peer.
    pub fn mine_blocks(&mut self) -> Result<(), NodeError> {
        let block = self.actual_block.take().ok_or(NodeError::Uninitialized)?;
        let coherence_block = self.actual_coherence_block.take().ok_or(NodeError::Uninitialized)?;
        let entangled_hash = self.actual_entangled_hash.take().ok_or(NodeError::Uninitialized)?;

        self.blockchain
            .append_block(block.clone(), coherence_block.clone(), entangled_hash.clone());
        self.broadcast_blocks(&block, &coherence_block, &entangled_hash);
        self.clear_round();
        self.blockchain.restart_transactions();
        Ok(())
    }

    fn broadcast_blocks(&self, block: &Block, coherence_block: &CoherenceBlock, entangled_hash: &str) {
        let message = ReceiveBlocksMessage {
            block: block.clone(),
            coherence_block: coherence_block.clone(),
            entangled_hash: entangled_hash.to_string(),
            node_id: self.node_id.clone(),
        };
        for (peer_id, url) in &self.peers {
            if let Err(err) = self.peer_client.receive_blocks(url, &message) {
                tracing::warn!(peer = %peer_id, %url, error = %err, "failed to broadcast blocks");
            }
        }
    }

    /// Ingests a block pair mined by the paired peer: checks it is not
    /// already known, that its `previous_hash` lines up with the local
    /// tip, and that it entangles correctly before appending.
    pub fn receive_blocks(
        &mut self,
        block: Block,
        coherence_block: CoherenceBlock,
        entangled_hash: String,
        node_id: &str,
    ) -> bool {
        if !self.accept_from(node_id) {
            return false;
        }
        if self.blockchain.has_block(&block) || self.blockchain.has_entangled_hash(&entangled_hash) {
            return false;
        }
        let expected_previous = self.blockchain.chain.last().map(|b| b.hash.clone()).unwrap_or_else(|| "0".to_string());
        if block.previous_hash != expected_previous {
            return false;
        }
        if !self.consensus.is_valid_block(&block, &coherence_block, &entangled_hash) {
            return false;
        }

        self.blockchain.append_block(block, coherence_block, entangled_hash);
        self.clear_round();
        self.blockchain.restart_transactions();
        true
    }

    /// Clears this round's key material, predictions, scores, and staged
    /// block pair, ready for a fresh round to start.
    pub fn clear_round(&mut self) {
        self.key = None;
        self.entangled_pair_key = None;
        self.consensus_predictions.clear();
        self.prediction_scores.clear();
        self.actual_block = None;
        self.actual_coherence_block = None;
        self.actual_entangled_hash = None;
    }

    // Lookups

    pub fn get_block(&self, hash: &str) -> Option<&Block> {
        self.blockchain.get_block(hash)
    }

    pub fn get_coherence_block(&self, hash: &str) -> Option<&CoherenceBlock> {
        self.blockchain.get_coherence_block(hash)
    }

    // Chain validation and sync

    pub fn validate_blockchain(&mut self) -> bool {
        self.blockchain.validate()
    }

    /// Adopts the longest chain among peers, but only a chain corroborated
    /// by at least `quorum_min` peers reporting the exact same `(chain,
    /// coherence_chain)` pair — two peers serving different chains of
    /// equal length do not corroborate each other. A peer that advertises
    /// a longer chain without that corroboration is penalized.
    pub fn sync_blockchain(&mut self) {
        let mut snapshots: Vec<(String, BlockchainSnapshot)> = Vec::new();
        for (peer_id, url) in self.peers.clone() {
            match self.peer_client.get_blockchain(&url) {
                Ok(snapshot) => snapshots.push((peer_id, snapshot)),
                Err(err) => tracing::warn!(peer = %peer_id, %url, error = %err, "get_blockchain failed during sync"),
            }
        }

        // Peers are queried through a `HashMap`, so iteration order is
        // otherwise unspecified; sort by id for a deterministic walk (the
        // peer that hits quorum first wins ties, same as the source's
        // insertion-ordered dict).
        snapshots.sort_by(|a, b| a.0.cmp(&b.0));

        let quorum = self.config.quorum_min(self.peers.len());
        let mut longest_len = self.blockchain.chain.len();
        let mut longest_coherence_len = self.blockchain.coherence_chain.len();
        let mut adopted: Option<BlockchainSnapshot> = None;

        for (peer_id, candidate) in &snapshots {
            if candidate.chain.len() <= longest_len || candidate.coherence_chain.len() <= longest_coherence_len {
                continue;
            }

            let corroborating = snapshots
                .iter()
                .filter(|(_, other)| other.chain == candidate.chain && other.coherence_chain == candidate.coherence_chain)
                .count();

            if corroborating >= quorum {
                longest_len = candidate.chain.len();
                longest_coherence_len = candidate.coherence_chain.len();
                adopted = Some(candidate.clone());
            } else {
                tracing::warn!(peer = %peer_id, "peer advertised a longer chain without quorum corroboration, penalizing");
                self.penalize(peer_id);
                break;
            }
        }

        if let Some(snapshot) = adopted {
            self.blockchain.chain = snapshot.chain;
            self.blockchain.coherence_chain = snapshot.coherence_chain;
            self.blockchain.entangled_blocks = snapshot.entangled_blocks;
            self.blockchain.current_chain_index = snapshot.current_chain_index;
            self.blockchain.current_coherence_chain_index = snapshot.current_coherence_chain_index;
            self.blockchain.pending_transactions = snapshot.pending_transactions;
            if !self.blockchain.validate() {
                tracing::warn!("adopted peer chain failed validation after sync");
            }
        }
    }

    pub fn blockchain_snapshot(&self) -> BlockchainSnapshot {
        BlockchainSnapshot::from(&self.blockchain)
    }

    // Wallet passthroughs

    pub fn create_wallet(&self) -> Result<Wallet, NodeError> {
        Ok(self.blockchain.create_wallet()?)
    }

    pub fn get_balance(&self, address: &str) -> f64 {
        self.blockchain.balance_of(address)
    }

    pub fn recover_wallet_from_recovery_key(&self, recovery_key: &str, passphrase: &str) -> Result<Wallet, NodeError> {
        Ok(self.blockchain.recover_wallet_from_recovery_key(recovery_key, passphrase)?)
    }

    pub fn recover_wallet_from_mnemonic(&self, mnemonic: &str, passphrase: &str) -> Result<Wallet, NodeError> {
        Ok(self.blockchain.recover_wallet_from_mnemonic(mnemonic, passphrase)?)
    }

    // Penalties

    fn accept_from(&mut self, node_id: &str) -> bool {
        let penalty_count = *self.times_that_nodes_were_penalized.get(node_id).unwrap_or(&0);
        if penalty_count >= self.config.max_penalties {
            return false;
        }

        if let Some(&started_at) = self.penalized_nodes.get(node_id) {
            if now_unix() - started_at < self.config.max_penalization_time {
                return false;
            }
            self.penalized_nodes.remove(node_id);
        }
        true
    }

    fn penalize(&mut self, node_id: &str) {
        self.penalized_nodes.insert(node_id.to_string(), now_unix());
        *self.times_that_nodes_were_penalized.entry(node_id.to_string()).or_insert(0) += 1;
        tracing::warn!(peer = %node_id, "penalizing peer for broadcasting ahead of its mempool limit");
    }
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// `int(SHA-256(node_id || pair_id || rand[1000,9999]), 16) mod 100000`,
/// the same formula used for the zero node's self-pairing key.
fn generate_round_key(node_id: &str, pair_id: &str) -> u64 {
    let salt: u32 = rand::thread_rng().gen_range(1000..=9999);
    let seed = format!("{node_id}{pair_id}{salt}");
    crate::types::hex_digest_mod(&crate::types::bare_sha256_hex(seed.as_bytes()), 100_000)
}

#[cfg(test)]
mod tests {
    use super::super::peer_client::fake::FakePeerClient;
    use super::*;
    use crate::protocol::PeerInfo;

    fn node(id: &str, ip: &str, port: u16) -> Node<FakePeerClient> {
        Node::new(id, ip, port, NodeConfig::default(), FakePeerClient::new()).unwrap()
    }

    #[test]
    fn register_peer_skips_self() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.register_peer("n0", "http://127.0.0.1:5000");
        n.register_peer("n1", "http://127.0.0.1:5001");
        assert_eq!(n.peers().len(), 1);
        assert!(n.peers().contains_key("n1"));
    }

    #[test]
    fn find_pair_picks_an_unentangled_peer_and_sends_a_request() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.register_peer("n1", "http://127.0.0.1:5001");
        n.peer_client.set_node_info(
            "http://127.0.0.1:5001",
            PeerInfo { node_id: "n1".to_string(), entangled_pair_id: None },
        );

        let chosen = n.find_pair().unwrap();
        assert_eq!(chosen, Some("n1".to_string()));
        assert_eq!(n.entangled_pair_id(), Some("n1"));
        assert!(n.peer_client.calls().iter().any(|c| c.starts_with("entanglement_request")));
    }

    #[test]
    fn find_pair_skips_already_entangled_peers() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.register_peer("n1", "http://127.0.0.1:5001");
        n.peer_client.set_node_info(
            "http://127.0.0.1:5001",
            PeerInfo { node_id: "n1".to_string(), entangled_pair_id: Some("n2".to_string()) },
        );

        let chosen = n.find_pair().unwrap();
        assert_eq!(chosen, None);
        assert!(n.entangled_pair_id().is_none());
    }

    #[test]
    fn accept_entanglement_requires_requester_to_point_back() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.register_peer("n1", "http://127.0.0.1:5001");
        n.peer_client.set_node_info(
            "http://127.0.0.1:5001",
            PeerInfo { node_id: "n1".to_string(), entangled_pair_id: Some("n0".to_string()) },
        );
        assert!(n.accept_entanglement("n1").unwrap());
        assert_eq!(n.entangled_pair_id(), Some("n1"));
    }

    #[test]
    fn accept_entanglement_refuses_when_requester_points_elsewhere() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.register_peer("n1", "http://127.0.0.1:5001");
        n.peer_client.set_node_info(
            "http://127.0.0.1:5001",
            PeerInfo { node_id: "n1".to_string(), entangled_pair_id: Some("someone-else".to_string()) },
        );
        assert!(!n.accept_entanglement("n1").unwrap());
        assert!(n.entangled_pair_id().is_none());
    }

    #[test]
    fn receive_prediction_penalizes_a_peer_that_is_ahead_of_local_mempool() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.entangled_pair_id = Some("n1".to_string());
        assert!(n.receive_prediction("n1", 42));
        assert_eq!(n.times_that_nodes_were_penalized().get("n1"), Some(&1));
    }

    #[test]
    fn accept_from_drops_messages_after_max_penalties() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.entangled_pair_id = Some("n1".to_string());
        for i in 0..n.config.max_penalties {
            assert!(n.receive_prediction("n1", i as u64));
        }
        assert!(!n.receive_prediction("n1", 99));
    }

    #[test]
    fn full_round_commits_a_block_when_local_node_wins() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.entangled_pair_id = Some("n1".to_string());

        for i in 0..n.blockchain.transaction_limit {
            n.add_transaction(Transaction::new("Φxa", "Φxb", i as f64, None, i as u64));
        }

        n.key = Some(111);
        n.entangled_pair_key = Some(222);
        n.generate_blocks("n1").unwrap();
        assert!(n.actual_block.is_some());

        let own_prediction = n.generate_prediction();
        n.consensus_predictions.insert("n1".to_string(), own_prediction.wrapping_add(1));

        let coherence_key = n.actual_coherence_block.as_ref().unwrap().coherence_key;
        let score = n.set_score(coherence_key).unwrap();
        if let Some(score) = score {
            n.prediction_scores.insert("n0".to_string(), score);
            n.prediction_scores.insert("n1".to_string(), score + 1);

            let outcome = n.evaluate_round().unwrap();
            assert_eq!(outcome, RoundOutcome::Won);
            n.mine_blocks().unwrap();
            assert_eq!(n.blockchain().chain.len(), 2);
        }
    }

    #[test]
    fn advance_round_stages_blocks_before_scoring_and_commits_on_win() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.register_peer("n1", "http://127.0.0.1:5001");
        n.entangled_pair_id = Some("n1".to_string());

        for i in 0..n.blockchain.transaction_limit {
            n.add_transaction(Transaction::new("Φxa", "Φxb", i as f64, None, i as u64));
        }

        // Drive the state machine: key exchange, then simulate the pair's
        // key arriving, then its prediction, then its score.
        assert_eq!(n.advance_round().unwrap(), RoundOutcome::Pending);
        assert!(n.key.is_some());
        n.receive_key(222);
        assert_eq!(n.advance_round().unwrap(), RoundOutcome::Pending);
        assert!(n.actual_block.is_some(), "blocks must be staged before a score can be computed");
        assert!(n.consensus_predictions.contains_key("n0"));

        assert!(n.receive_prediction("n1", 42));
        let outcome = n.advance_round().unwrap();
        assert!(n.prediction_scores.contains_key("n0"));

        match outcome {
            RoundOutcome::Pending => {
                assert!(n.receive_score("n1", n.prediction_scores["n0"] + 1));
                assert_eq!(n.advance_round().unwrap(), RoundOutcome::Won);
                assert_eq!(n.blockchain().chain.len(), 2);
            }
            RoundOutcome::Retry => {
                assert!(n.actual_block.is_none());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn receive_blocks_rejects_a_block_with_the_wrong_previous_hash() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.entangled_pair_id = Some("n1".to_string());
        let block = Block::new(5, "not-the-real-tip", vec![]);
        let mut coherence_block =
            CoherenceBlock::new(5, "0", "n1", "n0", 1, 2, block.hash.clone());
        let entangled_hash = n.consensus.entangle_blocks(&block, &coherence_block);
        coherence_block.set_entangled_hash(entangled_hash.clone());

        assert!(!n.receive_blocks(block, coherence_block, entangled_hash, "n1"));
    }

    #[test]
    fn receive_blocks_accepts_a_correctly_chained_block_from_the_pair() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.entangled_pair_id = Some("n1".to_string());
        let tip = n.blockchain.chain.last().unwrap().hash.clone();

        let block = Block::new(1, tip, vec![]);
        let mut coherence_block = CoherenceBlock::new(1, "0", "n1", "n0", 1, 2, block.hash.clone());
        let entangled_hash = n.consensus.entangle_blocks(&block, &coherence_block);
        coherence_block.set_entangled_hash(entangled_hash.clone());

        assert!(n.receive_blocks(block, coherence_block, entangled_hash, "n1"));
        assert_eq!(n.blockchain().chain.len(), 2);
        assert!(n.key.is_none(), "accepting the pair's block clears this node's own round state");
    }

    #[test]
    fn retry_round_clears_state_when_score_is_out_of_tolerance() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.entangled_pair_id = Some("n1".to_string());
        n.key = Some(0);
        n.entangled_pair_key = Some(0);
        n.consensus_predictions.insert("n0".to_string(), 0);
        n.consensus_predictions.insert("n1".to_string(), 0);

        // node_prediction=0, node_key=0, pair_key=0 hashes to bucket 10095;
        // coherence_key=2 hashes (with the same keys) to bucket 35263, well
        // outside the +/-50% validation band, so the round must retry.
        let score = n.set_score(2).unwrap();
        assert!(score.is_none());

        n.clear_round();
        assert!(n.key.is_none());
        assert!(n.entangled_pair_key.is_none());
        assert!(n.consensus_predictions.is_empty());
        assert!(n.actual_block.is_none());
    }

    #[test]
    fn sync_blockchain_adopts_length_only_with_quorum_corroboration() {
        let mut n = node("n0", "127.0.0.1", 5000);
        n.register_peer("n1", "http://127.0.0.1:5001");
        n.register_peer("n2", "http://127.0.0.1:5002");
        n.register_peer("n3", "http://127.0.0.1:5003");

        let local_len = n.blockchain.chain.len() as u64;

        let mut corroborated = BlockchainSnapshot::from(&n.blockchain);
        corroborated.chain.push(Block::new(local_len, "extra", vec![]));
        corroborated
            .coherence_chain
            .push(CoherenceBlock::new(local_len, "extra", "x", "y", 1, 2, "extra-block-hash"));

        let mut lone_divergent = corroborated.clone();
        lone_divergent.chain.push(Block::new(local_len + 1, "further", vec![]));
        lone_divergent
            .coherence_chain
            .push(CoherenceBlock::new(local_len + 1, "further", "x", "y", 3, 4, "further-block-hash"));

        n.peer_client.set_blockchain("http://127.0.0.1:5001", corroborated.clone());
        n.peer_client.set_blockchain("http://127.0.0.1:5002", corroborated.clone());
        n.peer_client.set_blockchain("http://127.0.0.1:5003", lone_divergent.clone());

        n.sync_blockchain();

        assert_eq!(n.blockchain.chain.len(), corroborated.chain.len());
        assert_ne!(n.blockchain.chain.len(), lone_divergent.chain.len());
    }
}
