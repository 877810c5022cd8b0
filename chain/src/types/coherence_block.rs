//! The sibling chain element that carries the producing pair's identities
//! and per-round keys, and is reciprocally linked to its [`Block`].
//!
//! [`Block`]: super::block::Block

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::hash::{hex_digest_mod, phi_sha256};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CoherenceBlock {
    pub index: u64,
    pub previous_hash: String,
    pub node_id: String,
    pub entangled_node_id: String,
    pub node_key: u64,
    pub entangled_node_key: u64,
    pub block_hash: String,
    pub coherence_key: u64,
    #[serde(default)]
    pub entangled_hash: Option<String>,
    pub timestamp: f64,
    pub hash: String,
}

impl CoherenceBlock {
    /// Builds a coherence block, deriving `coherence_key` when not already
    /// known and computing the content hash.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: u64,
        previous_hash: impl Into<String>,
        node_id: impl Into<String>,
        entangled_node_id: impl Into<String>,
        node_key: u64,
        entangled_node_key: u64,
        block_hash: impl Into<String>,
    ) -> Self {
        let mut cb = Self {
            index,
            previous_hash: previous_hash.into(),
            node_id: node_id.into(),
            entangled_node_id: entangled_node_id.into(),
            node_key,
            entangled_node_key,
            block_hash: block_hash.into(),
            coherence_key: 0,
            entangled_hash: None,
            timestamp: current_unix_timestamp(),
            hash: String::new(),
        };
        cb.coherence_key = cb.generate_coherence_key();
        cb.hash = cb.calculate_hash();
        cb
    }

    /// `int(SHA-256(node_key || entangled_node_key || rand[1000,9999]), 16) mod 100000`.
    pub fn generate_coherence_key(&self) -> u64 {
        let salt: u32 = rand::thread_rng().gen_range(1000..=9999);
        let seed = format!("{}{}{}", self.node_key, self.entangled_node_key, salt);
        let digest = super::hash::bare_sha256_hex(seed.as_bytes());
        hex_digest_mod(&digest, 100_000)
    }

    /// `Φx` + SHA-256 of the stringified content fields, excluding
    /// `entangled_hash` (filled in only after entangling with the block).
    pub fn calculate_hash(&self) -> String {
        let body = format!(
            "{}{}{}{}{}{}{}{}{}",
            self.index,
            self.previous_hash,
            self.node_id,
            self.entangled_node_id,
            self.node_key,
            self.entangled_node_key,
            self.block_hash,
            self.coherence_key,
            format_fixed(self.timestamp),
        );
        phi_sha256(body.as_bytes())
    }

    /// Records the entanglement hash computed by the consensus engine.
    pub fn set_entangled_hash(&mut self, entangled_hash: impl Into<String>) {
        self.entangled_hash = Some(entangled_hash.into());
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

    #[test]
    fn coherence_key_is_bounded() {
        let cb = CoherenceBlock::new(0, "0", "n0", "n1", 123, 456, "Φxblockhash");
        assert!(cb.coherence_key < 100_000);
    }

    #[test]
    fn hash_excludes_entangled_hash() {
        let mut cb = CoherenceBlock::new(1, "prev", "n0", "n1", 1, 2, "Φxblockhash");
        let before = cb.hash.clone();
        cb.set_entangled_hash("Φxentangled");
        assert_eq!(cb.calculate_hash(), before);
    }

    #[test]
    fn hash_changes_with_node_key() {
        let mut a = CoherenceBlock::new(1, "prev", "n0", "n1", 1, 2, "Φxblockhash");
        a.timestamp = 1.0;
        a.hash = a.calculate_hash();

        let mut b = a.clone();
        b.node_key = 99;
        b.hash = b.calculate_hash();

        assert_ne!(a.hash, b.hash);
    }
}
