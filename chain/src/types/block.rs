// chain/src/types/block.rs

//! The primary chain element: an ordered batch of transactions bound to
//! its predecessor by hash, and to its sibling [`CoherenceBlock`] by a
//! two-way hash link.
//!
//! [`CoherenceBlock`]: super::coherence_block::CoherenceBlock

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::hash::phi_sha256;
use super::transaction::Transaction;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    #[serde(default)]
    pub coherence_block_hash: Option<String>,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub hash: String,
}

impl Block {
    /// Builds a block and computes its hash. `index == 0` with
    /// `previous_hash == "0"` is the genesis convention.
    pub fn new(index: u64, previous_hash: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        let timestamp = current_unix_timestamp();
        let mut block = Self {
            index,
            previous_hash: previous_hash.into(),
            coherence_block_hash: None,
            timestamp,
            transactions,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    /// `Φx` + SHA-256 of the stringified `(index, previous_hash, timestamp,
    /// transactions)` tuple. `coherence_block_hash` is deliberately excluded:
    /// it is filled in after this hash is first computed.
    pub fn calculate_hash(&self) -> String {
        let txs_repr = serde_json::to_string(&self.transactions)
            .expect("Transaction serialization is infallible");
        let body = format!(
            "{}{}{}{}",
            self.index,
            self.previous_hash,
            format_fixed(self.timestamp),
            txs_repr
        );
        phi_sha256(body.as_bytes())
    }

    /// Records the hash of this block's sibling coherence block.
    pub fn link_coherence_block(&mut self, coherence_block_hash: impl Into<String>) {
        self.coherence_block_hash = Some(coherence_block_hash.into());
    }
}

fn format_fixed(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        format!("{v}")
    }
}

fn current_unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        let mut tx = Transaction::new("Φxaaa", "Φxbbb", 1.0, None, 0);
        tx.timestamp = 1_700_000_000.0;
        tx.hash = tx.calculate_hash();
        tx
    }

    #[test]
    fn hash_is_deterministic() {
        let mut a = Block::new(0, "0", vec![sample_tx()]);
        a.timestamp = 1_700_000_001.0;
        a.hash = a.calculate_hash();

        let b = a.clone();
        assert_eq!(a.hash, b.calculate_hash());
    }

    #[test]
    fn hash_changes_with_transactions() {
        let mut a = Block::new(1, "prev", vec![sample_tx()]);
        a.timestamp = 1.0;
        a.hash = a.calculate_hash();

        let mut b = a.clone();
        b.transactions.push(sample_tx());
        b.hash = b.calculate_hash();

        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn genesis_previous_hash_is_literal_zero() {
        let genesis = Block::new(0, "0", vec![]);
        assert_eq!(genesis.previous_hash, "0");
    }

    #[test]
    fn coherence_block_hash_is_excluded_from_content_hash() {
        let mut a = Block::new(2, "prev", vec![sample_tx()]);
        a.timestamp = 1.0;
        a.hash = a.calculate_hash();
        let before = a.hash.clone();

        a.link_coherence_block("Φxsomehash");
        assert_eq!(a.calculate_hash(), before);
    }
}
