//! The `Φx` marker and the SHA-256 hashing helpers every chain element uses.
//!
//! Every hash and address in this system is the literal two-character
//! marker `Φx` (Greek capital Phi, lowercase x — UTF-8 `0xCE 0xA6 0x78`)
//! followed by a lowercase hex digest. The marker is part of the stored
//! value, not a display affectation, and must round-trip byte-for-byte.

use sha2::{Digest, Sha256};

/// The literal prefix carried by every hash and address in this system.
pub const PHI_X: &str = "\u{03A6}x";

/// Returns `true` if `s` begins with the [`PHI_X`] marker.
pub fn has_phi_prefix(s: &str) -> bool {
    s.starts_with(PHI_X)
}

/// Strips the [`PHI_X`] marker, returning the remaining hex digest.
pub fn strip_phi_prefix(s: &str) -> Option<&str> {
    s.strip_prefix(PHI_X)
}

/// Hashes `data` with SHA-256 and returns the `Φx`-prefixed lowercase hex digest.
pub fn phi_sha256(data: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(data.as_ref());
    format!("{PHI_X}{}", hex::encode(digest))
}

/// Hashes `data` with SHA-256 and returns the bare lowercase hex digest,
/// with no `Φx` marker. Used internally for values (like entanglement
/// hashes and round keys) that are folded into further computation rather
/// than surfaced as addresses.
pub fn bare_sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Reduces a hex-encoded SHA-256 digest to an integer in `[0, modulus)`,
/// by parsing it as a big-endian integer and reducing modulo `modulus`.
///
/// This mirrors `int(digest, 16) % modulus` in the original Python source.
pub fn hex_digest_mod(hex_digest: &str, modulus: u64) -> u64 {
    let mut acc: u64 = 0;
    for byte in hex_digest.as_bytes().chunks(8) {
        // Fold the digest in base-16 nibble by nibble to avoid needing a
        // bignum type: acc = (acc * 16^n + chunk_value) mod modulus.
        for &b in byte {
            let nibble = (b as char).to_digit(16).unwrap_or(0) as u64;
            acc = (acc * 16 + nibble) % modulus;
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phi_sha256_carries_the_marker() {
        let h = phi_sha256(b"hello");
        assert!(has_phi_prefix(&h));
        let digest = strip_phi_prefix(&h).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn phi_sha256_is_deterministic() {
        assert_eq!(phi_sha256(b"abc"), phi_sha256(b"abc"));
        assert_ne!(phi_sha256(b"abc"), phi_sha256(b"abd"));
    }

    #[test]
    fn hex_digest_mod_is_stable_and_bounded() {
        let digest = bare_sha256_hex(b"round-key-seed");
        let a = hex_digest_mod(&digest, 100_000);
        let b = hex_digest_mod(&digest, 100_000);
        assert_eq!(a, b);
        assert!(a < 100_000);
    }
}
