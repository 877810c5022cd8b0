//! Low-level BIP-32-style child key derivation helpers.
//!
//! Every path element, hardened or not, is derived the same way here:
//! `HMAC-SHA512(chain_code, 0x00 || private_key || index_be32)`, split
//! into a 32-byte tweak and a new chain code, with the tweak added to the
//! parent private key modulo the secp256k1 group order. This mirrors the
//! node's own wallet derivation rather than full dual-branch BIP-32 (which
//! would derive non-hardened children from the parent public key instead).

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// The order of the secp256k1 base point, big-endian.
pub const SECP256K1_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41,
];

/// Derives one BIP-44 path element, returning the child `(private_key, chain_code)`.
pub fn child_key_derive(private_key: &[u8; 32], chain_code: &[u8; 32], index: u32) -> ([u8; 32], [u8; 32]) {
    let mut data = Vec::with_capacity(1 + 32 + 4);
    data.push(0u8);
    data.extend_from_slice(private_key);
    data.extend_from_slice(&index.to_be_bytes());

    let mut mac = HmacSha512::new_from_slice(chain_code).expect("HMAC accepts any key length");
    mac.update(&data);
    let result = mac.finalize().into_bytes();

    let mut il = [0u8; 32];
    let mut child_chain_code = [0u8; 32];
    il.copy_from_slice(&result[0..32]);
    child_chain_code.copy_from_slice(&result[32..64]);

    let child_private = add_mod_order(private_key, &il);
    (child_private, child_chain_code)
}

fn bytes_to_limbs(b: &[u8; 32]) -> [u64; 4] {
    let mut limbs = [0u64; 4];
    for i in 0..4 {
        let start = i * 8;
        limbs[i] = u64::from_be_bytes(b[start..start + 8].try_into().unwrap());
    }
    limbs
}

fn limbs_to_bytes(limbs: &[u64; 4]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for i in 0..4 {
        out[i * 8..i * 8 + 8].copy_from_slice(&limbs[i].to_be_bytes());
    }
    out
}

fn add_limbs(a: &[u64; 4], b: &[u64; 4]) -> ([u64; 4], u64) {
    let mut result = [0u64; 4];
    let mut carry: u128 = 0;
    for i in (0..4).rev() {
        let s = a[i] as u128 + b[i] as u128 + carry;
        result[i] = s as u64;
        carry = s >> 64;
    }
    (result, carry as u64)
}

fn sub_limbs(a: &[u64; 4], b: &[u64; 4]) -> [u64; 4] {
    let mut result = [0u64; 4];
    let mut borrow: i128 = 0;
    for i in (0..4).rev() {
        let diff = a[i] as i128 - b[i] as i128 - borrow;
        if diff < 0 {
            result[i] = (diff + (1i128 << 64)) as u64;
            borrow = 1;
        } else {
            result[i] = diff as u64;
            borrow = 0;
        }
    }
    result
}

fn ge_limbs(a: &[u64; 4], b: &[u64; 4]) -> bool {
    for i in 0..4 {
        if a[i] != b[i] {
            return a[i] > b[i];
        }
    }
    true
}

/// `(a + b) mod SECP256K1_ORDER`, treating `a` and `b` as big-endian 256-bit integers.
pub fn add_mod_order(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let order = bytes_to_limbs(&SECP256K1_ORDER);
    let (sum, carry) = add_limbs(&bytes_to_limbs(a), &bytes_to_limbs(b));

    let reduced = if carry == 1 || ge_limbs(&sum, &order) {
        sub_limbs(&sum, &order)
    } else {
        sum
    };
    limbs_to_bytes(&reduced)
}
