//! The entanglement consensus algorithm: per-round predictions, the score
//! formula, winner selection, and whole-chain validation.
//!
//! `EntanglementConsensus` is stateless — every method is a pure function
//! of its arguments — so a single zero-sized instance is shared across
//! every node in the process.

use std::collections::HashMap;

use rand::Rng;

use crate::types::block::Block;
use crate::types::coherence_block::CoherenceBlock;
use crate::types::hash::{bare_sha256_hex, hex_digest_mod};

#[derive(Clone, Copy, Debug, Default)]
pub struct EntanglementConsensus;

impl EntanglementConsensus {
    /// `int(SHA-256(node_id || entangled_pair_id || rand[1000,9999]), 16) mod 100000`.
    pub fn generate_node_prediction(&self, node_id: &str, entangled_pair_id: &str) -> u64 {
        let salt: u32 = rand::thread_rng().gen_range(1000..=9999);
        let seed = format!("{node_id}{entangled_pair_id}{salt}");
        hex_digest_mod(&bare_sha256_hex(seed.as_bytes()), 100_000)
    }

    /// `int(SHA-256(node_prediction || node_key || pair_key), 16) mod 100000`.
    ///
    /// `pair_prediction` is accepted for API symmetry with the original
    /// source but does not participate in the bucket computation; see the
    /// open-question note in the node orchestrator.
    pub fn hash_predictions_and_keys(
        &self,
        node_prediction: u64,
        _pair_prediction: u64,
        node_key: u64,
        pair_key: u64,
    ) -> u64 {
        let seed = format!("{node_prediction}{node_key}{pair_key}");
        hex_digest_mod(&bare_sha256_hex(seed.as_bytes()), 100_000)
    }

    /// `int(SHA-256(key || node_key || pair_key), 16) mod 100000`.
    pub fn hash_key(&self, key: u64, node_key: u64, pair_key: u64) -> u64 {
        let seed = format!("{key}{node_key}{pair_key}");
        hex_digest_mod(&bare_sha256_hex(seed.as_bytes()), 100_000)
    }

    /// `prediction == hashed_key`, or within the ±50% tolerance band.
    pub fn validate_score(&self, prediction: u64, hashed_key: u64) -> bool {
        if prediction == hashed_key {
            return true;
        }
        let prediction = prediction as f64;
        let hashed_key = hashed_key as f64;
        prediction >= hashed_key * 0.5 && prediction <= hashed_key * 1.5
    }

    /// Computes this round's score, or `None` if the score fails validation
    /// (the caller should restart the round from block generation).
    pub fn prediction_score(
        &self,
        node_prediction: u64,
        pair_prediction: u64,
        node_key: u64,
        pair_key: u64,
        coherence_key: u64,
    ) -> Option<i64> {
        let prediction_bucket =
            self.hash_predictions_and_keys(node_prediction, pair_prediction, node_key, pair_key);
        let key_bucket = self.hash_key(coherence_key, node_key, pair_key);

        if self.validate_score(prediction_bucket, key_bucket) {
            Some(prediction_bucket as i64 - key_bucket as i64)
        } else {
            None
        }
    }

    /// Informational check, not used by [`Self::is_valid_block`]:
    /// `|node_prediction + entangled_node_prediction| == coherence_key`, or
    /// within ±10%.
    pub fn validate_entanglement(
        &self,
        node_prediction: i64,
        entangled_node_prediction: i64,
        coherence_key: u64,
    ) -> bool {
        let total = (node_prediction + entangled_node_prediction).unsigned_abs();
        let coherence_key_f = coherence_key as f64;
        let total_f = total as f64;
        total == coherence_key || (total_f <= coherence_key_f * 1.1 && total_f >= coherence_key_f * 0.9)
    }

    /// `SHA-256(block.hash || coherence_block.hash || node_key || entangled_node_key)`,
    /// as a bare lowercase hex digest (no `Φx` marker — this hash anchors
    /// the `entangled_blocks` map key, it is not itself an address).
    pub fn entangle_blocks(&self, block: &Block, coherence_block: &CoherenceBlock) -> String {
        let seed = format!(
            "{}{}{}{}",
            block.hash, coherence_block.hash, coherence_block.node_key, coherence_block.entangled_node_key
        );
        bare_sha256_hex(seed.as_bytes())
    }

    /// Recomputes the entanglement hash and compares it with `entangled_hash`.
    pub fn is_valid_block(&self, block: &Block, coherence_block: &CoherenceBlock, entangled_hash: &str) -> bool {
        self.entangle_blocks(block, coherence_block) == entangled_hash
    }

    /// Returns the node with the lowest score, breaking ties by order of
    /// appearance in `prediction_scores`.
    pub fn find_best_prediction_score(&self, prediction_scores: &[(String, i64)]) -> Option<String> {
        let mut best_score = i64::MAX;
        let mut winner: Option<String> = None;
        for (node_id, score) in prediction_scores {
            if *score < best_score {
                best_score = *score;
                winner = Some(node_id.clone());
            }
        }
        winner
    }

    /// Walks both chains verifying invariants 1–7. Invariant 5's
    /// `coherence_block_hash` mismatch is self-healed in place rather than
    /// rejected.
    pub fn validate_blockchain(
        &self,
        chain: &mut [Block],
        coherence_chain: &[CoherenceBlock],
        entangled_blocks: &HashMap<String, (Block, CoherenceBlock)>,
    ) -> bool {
        if chain.len() != coherence_chain.len() {
            return false;
        }

        for block in chain.iter() {
            if block.index == 0 {
                if block.previous_hash != "0" {
                    return false;
                }
            } else if block.previous_hash != chain[(block.index - 1) as usize].hash {
                return false;
            }
        }

        for coherence_block in coherence_chain {
            if coherence_block.index == 0 {
                if coherence_block.previous_hash != "0" {
                    return false;
                }
            } else if coherence_block.previous_hash
                != coherence_chain[(coherence_block.index - 1) as usize].hash
            {
                return false;
            }

            let i = coherence_block.index as usize;
            if coherence_block.index != chain[i].index {
                return false;
            }

            if chain[i].coherence_block_hash.as_deref() != Some(coherence_block.hash.as_str()) {
                chain[i].coherence_block_hash = Some(coherence_block.hash.clone());
            }

            if chain[i].hash != coherence_block.block_hash {
                return false;
            }

            let entangled_hash = match &coherence_block.entangled_hash {
                Some(h) => h,
                None => return false,
            };

            match entangled_blocks.get(entangled_hash) {
                Some((stored_block, stored_coherence)) => {
                    if stored_block.hash != chain[i].hash || stored_coherence != coherence_block {
                        return false;
                    }
                }
                None => return false,
            }

            if !self.is_valid_block(&chain[i], coherence_block, entangled_hash) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn paired_blocks(node_key: u64, entangled_node_key: u64) -> (Block, CoherenceBlock) {
        let block = Block::new(0, "0", vec![]);
        let mut coherence_block =
            CoherenceBlock::new(0, "0", "n0", "n1", node_key, entangled_node_key, block.hash.clone());
        let engine = EntanglementConsensus;
        let entangled = engine.entangle_blocks(&block, &coherence_block);
        coherence_block.set_entangled_hash(entangled);
        (block, coherence_block)
    }

    #[test]
    fn entangle_blocks_is_deterministic() {
        let engine = EntanglementConsensus;
        let (block, coherence_block) = paired_blocks(1, 2);
        let a = engine.entangle_blocks(&block, &coherence_block);
        let b = engine.entangle_blocks(&block, &coherence_block);
        assert_eq!(a, b);
    }

    #[test]
    fn is_valid_block_detects_tampering() {
        let engine = EntanglementConsensus;
        let (block, coherence_block) = paired_blocks(1, 2);
        let correct = coherence_block.entangled_hash.clone().unwrap();
        assert!(engine.is_valid_block(&block, &coherence_block, &correct));
        assert!(!engine.is_valid_block(&block, &coherence_block, "deadbeef"));
    }

    #[test]
    fn validate_score_accepts_exact_and_band() {
        let engine = EntanglementConsensus;
        assert!(engine.validate_score(100, 100));
        assert!(engine.validate_score(60, 100));
        assert!(engine.validate_score(150, 100));
        assert!(!engine.validate_score(49, 100));
        assert!(!engine.validate_score(151, 100));
    }

    #[test]
    fn find_best_prediction_score_picks_lowest_and_breaks_ties_by_order() {
        let engine = EntanglementConsensus;
        let scores = vec![
            ("a".to_string(), 5),
            ("b".to_string(), 2),
            ("c".to_string(), 2),
        ];
        assert_eq!(engine.find_best_prediction_score(&scores), Some("b".to_string()));
    }

    #[test]
    fn validate_blockchain_accepts_a_well_formed_genesis() {
        let engine = EntanglementConsensus;
        let (block, coherence_block) = paired_blocks(11, 22);
        let mut chain = vec![block.clone()];
        let coherence_chain = vec![coherence_block.clone()];
        let mut entangled_blocks = HashMap::new();
        entangled_blocks.insert(
            coherence_block.entangled_hash.clone().unwrap(),
            (block, coherence_block),
        );

        assert!(engine.validate_blockchain(&mut chain, &coherence_chain, &entangled_blocks));
    }

    #[test]
    fn validate_blockchain_self_heals_coherence_block_hash() {
        let engine = EntanglementConsensus;
        let (mut block, coherence_block) = paired_blocks(11, 22);
        block.coherence_block_hash = Some("stale".to_string());
        let mut chain = vec![block.clone()];
        let coherence_chain = vec![coherence_block.clone()];
        let mut entangled_blocks = HashMap::new();
        entangled_blocks.insert(
            coherence_block.entangled_hash.clone().unwrap(),
            (block, coherence_block.clone()),
        );

        assert!(engine.validate_blockchain(&mut chain, &coherence_chain, &entangled_blocks));
        assert_eq!(chain[0].coherence_block_hash, Some(coherence_block.hash));
    }

    #[test]
    fn validate_blockchain_rejects_length_mismatch() {
        let engine = EntanglementConsensus;
        let (block, coherence_block) = paired_blocks(1, 2);
        let mut chain = vec![block.clone(), block];
        let coherence_chain = vec![coherence_block];
        let entangled_blocks = HashMap::new();
        assert!(!engine.validate_blockchain(&mut chain, &coherence_chain, &entangled_blocks));
    }
}
