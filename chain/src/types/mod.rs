//! Core domain types: the `Φx` hashing convention, the transaction record,
//! and the two linked chain elements (`Block` and `CoherenceBlock`).

pub mod block;
pub mod coherence_block;
pub mod hash;
pub mod transaction;

pub use block::Block;
pub use coherence_block::CoherenceBlock;
pub use hash::{PHI_X, bare_sha256_hex, has_phi_prefix, hex_digest_mod, phi_sha256, strip_phi_prefix};
pub use transaction::Transaction;
