//! In-memory blockchain state: the two linked chains, the pending mempool,
//! and account balances.

use std::collections::HashMap;

use crate::consensus::EntanglementConsensus;
use crate::types::{Block, CoherenceBlock, Transaction};
use crate::wallet::Wallet;

use super::error::ChainError;

/// The default number of pending transactions required before a block can
/// be proposed.
pub const DEFAULT_TRANSACTION_LIMIT: usize = 4;

/// The asset key under which native-currency balances are stored.
const NATIVE_ASSET: &str = "native";

/// The two linked chains, the pending transaction pool, and account state
/// for a single node. Not `Sync` by itself — callers serialize access
/// behind a lock (see `chain::node`).
#[derive(Clone, Debug)]
pub struct Blockchain {
    pub chain: Vec<Block>,
    pub coherence_chain: Vec<CoherenceBlock>,
    pub entangled_blocks: HashMap<String, (Block, CoherenceBlock)>,
    pub current_chain_index: u64,
    pub current_coherence_chain_index: u64,
    pub pending_transactions: Vec<Transaction>,
    pub transaction_limit: usize,
    /// Per-address asset balances, keyed by asset name (`"native"` for the
    /// base currency). The original indexed the same shape but then
    /// subtracted a float from the whole map; this keeps the nested shape
    /// well-typed while preserving the documented behavior (insufficient
    /// balance is a silent no-op).
    pub balances: HashMap<String, HashMap<String, f64>>,
    /// NFT ownership: owner address -> contract_code -> amount.
    pub nfts: HashMap<String, HashMap<String, f64>>,
    consensus: EntanglementConsensus,
}

impl Blockchain {
    /// Builds a fresh blockchain and immediately seeds it with the genesis
    /// block pair.
    pub fn new(transaction_limit: usize) -> Result<Self, ChainError> {
        let mut blockchain = Self {
            chain: Vec::new(),
            coherence_chain: Vec::new(),
            entangled_blocks: HashMap::new(),
            current_chain_index: 0,
            current_coherence_chain_index: 0,
            pending_transactions: Vec::new(),
            transaction_limit,
            balances: HashMap::new(),
            nfts: HashMap::new(),
            consensus: EntanglementConsensus,
        };
        blockchain.create_genesis_blocks()?;
        Ok(blockchain)
    }

    // Genesis

    /// Creates and entangles the genesis block pair, self-paired under the
    /// zero node identity (`node_id == entangled_node_id == "0"`), and
    /// appends them if entanglement checks out.
    fn create_genesis_blocks(&mut self) -> Result<(), ChainError> {
        tracing::info!("creating genesis blocks");
        let genesis_tx = self.create_genesis_transaction()?;
        let genesis_block = Block::new(self.current_chain_index, "0", vec![genesis_tx]);

        // The zero node is entangled with itself: both round keys are
        // generated independently from the same ("0", "0") identity pair,
        // matching the reference zero node's self-pairing.
        let node_key = generate_zero_node_key("0", "0");
        let entangled_node_key = generate_zero_node_key("0", "0");

        let mut coherence_block = CoherenceBlock::new(
            self.current_coherence_chain_index,
            "0",
            "0",
            "0",
            node_key,
            entangled_node_key,
            genesis_block.hash.clone(),
        );

        let mut genesis_block = genesis_block;
        genesis_block.link_coherence_block(coherence_block.hash.clone());

        let entangled_hash = self.consensus.entangle_blocks(&genesis_block, &coherence_block);
        coherence_block.set_entangled_hash(entangled_hash.clone());

        if !self.consensus.is_valid_block(&genesis_block, &coherence_block, &entangled_hash) {
            return Err(ChainError::GenesisFailed(
                "genesis block and coherence block failed to entangle".to_string(),
            ));
        }

        self.append_block(genesis_block, coherence_block, entangled_hash);
        Ok(())
    }

    /// Builds, signs, and self-verifies the genesis transaction (`"0"` to
    /// `"0"`, zero amount) using a throwaway wallet.
    fn create_genesis_transaction(&self) -> Result<Transaction, ChainError> {
        let genesis_wallet = Wallet::new(None, "", 0, 0)?;
        let mut tx = Transaction::new("0", "0", 0.0, None, 0);
        let (r, s, v) = genesis_wallet.sign_transaction(&tx.hash)?;
        let (_, public_key_hex) = genesis_wallet.public_info();
        tx.attach_signature(r, s, v, public_key_hex);

        if !genesis_wallet.verify_signature(
            tx.r.as_deref().unwrap(),
            tx.s.as_deref().unwrap(),
            tx.v.unwrap(),
            &tx.hash,
        )? {
            return Err(ChainError::GenesisFailed(
                "genesis transaction signature did not verify".to_string(),
            ));
        }
        Ok(tx)
    }

    // Block proposal

    /// Builds the next block and its coherence block from the pending
    /// mempool, without committing them. Fails if the mempool has not
    /// reached `transaction_limit`.
    pub fn create_block(
        &self,
        node_id: &str,
        entangled_node_id: &str,
        node_key: u64,
        entangled_node_key: u64,
    ) -> Result<(Block, CoherenceBlock, String), ChainError> {
        if self.pending_transactions.len() < self.transaction_limit {
            return Err(ChainError::InsufficientTransactions {
                have: self.pending_transactions.len(),
                need: self.transaction_limit,
            });
        }

        let previous_hash = self.chain.last().map(|b| b.hash.clone()).unwrap_or_else(|| "0".to_string());
        let block = Block::new(self.current_chain_index, previous_hash, self.pending_transactions.clone());

        let coherence_block = self.create_coherence_block(&block, node_id, entangled_node_id, node_key, entangled_node_key);

        let mut block = block;
        block.link_coherence_block(coherence_block.hash.clone());

        let entangled_hash = self.consensus.entangle_blocks(&block, &coherence_block);
        let mut coherence_block = coherence_block;
        coherence_block.set_entangled_hash(entangled_hash.clone());

        Ok((block, coherence_block, entangled_hash))
    }

    fn create_coherence_block(
        &self,
        block: &Block,
        node_id: &str,
        entangled_node_id: &str,
        node_key: u64,
        entangled_node_key: u64,
    ) -> CoherenceBlock {
        let previous_hash = self
            .coherence_chain
            .last()
            .map(|cb| cb.hash.clone())
            .unwrap_or_else(|| "0".to_string());
        CoherenceBlock::new(
            self.current_coherence_chain_index,
            previous_hash,
            node_id,
            entangled_node_id,
            node_key,
            entangled_node_key,
            block.hash.clone(),
        )
    }

    /// Appends an already-entangled block pair, advancing both chain
    /// indices. Does not re-validate; callers check `is_valid_block` and
    /// membership before committing.
    pub fn append_block(&mut self, block: Block, coherence_block: CoherenceBlock, entangled_hash: String) {
        self.current_chain_index += 1;
        self.current_coherence_chain_index += 1;
        self.chain.push(block.clone());
        self.coherence_chain.push(coherence_block.clone());
        self.entangled_blocks.insert(entangled_hash, (block, coherence_block));
    }

    pub fn has_block(&self, block: &Block) -> bool {
        self.chain.iter().any(|b| b.hash == block.hash)
    }

    pub fn has_coherence_block(&self, coherence_block: &CoherenceBlock) -> bool {
        self.coherence_chain.iter().any(|cb| cb.hash == coherence_block.hash)
    }

    pub fn has_entangled_hash(&self, entangled_hash: &str) -> bool {
        self.entangled_blocks.contains_key(entangled_hash)
    }

    pub fn get_block(&self, hash: &str) -> Option<&Block> {
        self.chain.iter().find(|b| b.hash == hash)
    }

    pub fn get_coherence_block(&self, hash: &str) -> Option<&CoherenceBlock> {
        self.coherence_chain.iter().find(|cb| cb.hash == hash)
    }

    /// Walks both chains through the consensus engine, self-healing
    /// `coherence_block_hash` mismatches in place.
    pub fn validate(&mut self) -> bool {
        self.consensus
            .validate_blockchain(&mut self.chain, &self.coherence_chain, &self.entangled_blocks)
    }

    // Transactions

    pub fn restart_transactions(&mut self) {
        self.pending_transactions.clear();
    }

    // Balances

    /// Moves `amount` from `tx.sender` to `tx.receiver` if the sender has
    /// sufficient native balance; otherwise leaves balances untouched.
    pub fn update_balances(&mut self, tx: &Transaction) {
        self.balances.entry(tx.sender.clone()).or_default().entry(NATIVE_ASSET.to_string()).or_insert(0.0);
        self.balances.entry(tx.receiver.clone()).or_default().entry(NATIVE_ASSET.to_string()).or_insert(0.0);

        let sender_balance = self.balances[&tx.sender][NATIVE_ASSET];
        if sender_balance >= tx.amount {
            *self.balances.get_mut(&tx.sender).unwrap().get_mut(NATIVE_ASSET).unwrap() -= tx.amount;
            *self.balances.get_mut(&tx.receiver).unwrap().get_mut(NATIVE_ASSET).unwrap() += tx.amount;
        } else {
            tracing::warn!(sender = %tx.sender, amount = tx.amount, "insufficient balance, skipping transfer");
        }
    }

    /// Moves NFT ownership of `tx.contract_code` from sender to receiver,
    /// recording `tx.amount` against the receiver.
    pub fn update_nft_balances(&mut self, tx: &Transaction) {
        self.nfts.entry(tx.sender.clone()).or_default();
        self.nfts.entry(tx.receiver.clone()).or_default();

        if let Some(contract_code) = &tx.contract_code {
            if let Some(sender_nfts) = self.nfts.get_mut(&tx.sender) {
                sender_nfts.remove(contract_code);
            }
            self.nfts.get_mut(&tx.receiver).unwrap().insert(contract_code.clone(), tx.amount);
        }
    }

    pub fn balance_of(&self, address: &str) -> f64 {
        self.balances.get(address).and_then(|assets| assets.get(NATIVE_ASSET)).copied().unwrap_or(0.0)
    }

    // Wallet helpers

    pub fn create_wallet(&self) -> Result<Wallet, ChainError> {
        Ok(Wallet::new(None, "", 0, 0)?)
    }

    pub fn recover_wallet_from_recovery_key(&self, recovery_key: &str, passphrase: &str) -> Result<Wallet, ChainError> {
        Ok(Wallet::from_recovery_key(recovery_key, passphrase)?)
    }

    pub fn recover_wallet_from_mnemonic(&self, mnemonic: &str, passphrase: &str) -> Result<Wallet, ChainError> {
        Ok(Wallet::new(Some(mnemonic.to_string()), passphrase, 0, 0)?)
    }

    /// Returns the wallet's recovery key then wipes its key material.
    pub fn export_recovery_key(&self, wallet: &mut Wallet) -> String {
        wallet.export_recovery_key()
    }
}

fn generate_zero_node_key(node_id: &str, entangled_pair_id: &str) -> u64 {
    use rand::Rng;

    let salt: u32 = rand::thread_rng().gen_range(1000..=9999);
    let seed = format!("{node_id}{entangled_pair_id}{salt}");
    crate::types::hex_digest_mod(&crate::types::bare_sha256_hex(seed.as_bytes()), 100_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_blockchain_has_a_valid_genesis_pair() {
        let blockchain = Blockchain::new(DEFAULT_TRANSACTION_LIMIT).expect("genesis should succeed");
        assert_eq!(blockchain.chain.len(), 1);
        assert_eq!(blockchain.coherence_chain.len(), 1);
        assert_eq!(blockchain.chain[0].previous_hash, "0");
        assert_eq!(blockchain.coherence_chain[0].previous_hash, "0");
    }

    #[test]
    fn create_block_requires_the_transaction_limit() {
        let blockchain = Blockchain::new(4).unwrap();
        let err = blockchain.create_block("a", "b", 1, 2).unwrap_err();
        assert!(matches!(err, ChainError::InsufficientTransactions { .. }));
    }

    #[test]
    fn create_block_succeeds_once_mempool_is_full() {
        let mut blockchain = Blockchain::new(2).unwrap();
        blockchain.pending_transactions.push(Transaction::new("Φxa", "Φxb", 1.0, None, 0));
        blockchain.pending_transactions.push(Transaction::new("Φxa", "Φxb", 2.0, None, 1));

        let (block, coherence_block, entangled_hash) = blockchain.create_block("n0", "n1", 10, 20).unwrap();
        assert_eq!(block.previous_hash, blockchain.chain[0].hash);
        assert_eq!(coherence_block.previous_hash, blockchain.coherence_chain[0].hash);
        assert!(!entangled_hash.is_empty());
    }

    #[test]
    fn update_balances_moves_funds_only_when_sufficient() {
        let mut blockchain = Blockchain::new(4).unwrap();
        blockchain
            .balances
            .entry("Φxa".to_string())
            .or_default()
            .insert(NATIVE_ASSET.to_string(), 10.0);
        let tx = Transaction::new("Φxa", "Φxb", 4.0, None, 0);
        blockchain.update_balances(&tx);
        assert_eq!(blockchain.balance_of("Φxa"), 6.0);
        assert_eq!(blockchain.balance_of("Φxb"), 4.0);

        let overdraft = Transaction::new("Φxa", "Φxb", 100.0, None, 1);
        blockchain.update_balances(&overdraft);
        assert_eq!(blockchain.balance_of("Φxa"), 6.0);
        assert_eq!(blockchain.balance_of("Φxb"), 4.0);
    }

    #[test]
    fn update_nft_balances_transfers_ownership() {
        let mut blockchain = Blockchain::new(4).unwrap();
        let tx = Transaction::new("Φxa", "Φxb", 1.0, Some("contract-1".to_string()), 0);
        blockchain.update_nft_balances(&tx);
        assert_eq!(blockchain.nfts["Φxb"]["contract-1"], 1.0);
        assert!(!blockchain.nfts["Φxa"].contains_key("contract-1"));
    }

    #[test]
    fn validate_accepts_freshly_created_genesis() {
        let mut blockchain = Blockchain::new(4).unwrap();
        assert!(blockchain.validate());
    }
}
