//! HD wallet: BIP-39 mnemonic generation, BIP-44 key derivation, address
//! checksumming, and recoverable ECDSA signing over secp256k1.

pub mod derivation;
pub mod error;

pub use error::WalletError;

use base64::Engine as _;
use bip39::{Language, Mnemonic};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey as Secp256k1PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};

use crate::types::{PHI_X, strip_phi_prefix};
use derivation::child_key_derive;

const HARDENED: u32 = 0x8000_0000;

/// An HD wallet: one mnemonic-derived keypair at a fixed BIP-44 path.
pub struct Wallet {
    pub address: String,
    public_key: [u8; 33],
    private_key: [u8; 32],
    chain_code: [u8; 32],
    mnemonic: String,
}

impl Wallet {
    /// Builds a wallet from an optional existing mnemonic. When `mnemonic`
    /// is `None`, a fresh 128-bit-entropy (12-word) BIP-39 mnemonic is
    /// generated.
    pub fn new(
        mnemonic: Option<String>,
        passphrase: &str,
        account: u32,
        index: u32,
    ) -> Result<Self, WalletError> {
        let mnemonic = match mnemonic {
            Some(phrase) => Mnemonic::parse_in_normalized(Language::English, &phrase)
                .map_err(|e| WalletError::Mnemonic(e.to_string()))?,
            None => Mnemonic::generate_in(Language::English, 12)
                .map_err(|e| WalletError::Mnemonic(e.to_string()))?,
        };
        let mnemonic_str = mnemonic.to_string();

        let seed = mnemonic.to_seed_normalized(passphrase);
        let (master_private, master_chain_code) = derive_master_key(&seed);

        let (private_key, chain_code) =
            derive_bip44_path(master_private, master_chain_code, account, index);

        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&private_key)
            .map_err(|e| WalletError::Derivation(format!("invalid derived private key: {e}")))?;
        let public_key = Secp256k1PublicKey::from_secret_key(&secp, &secret_key);
        let compressed = public_key.serialize();
        let uncompressed = public_key.serialize_uncompressed();

        let address = generate_eth_address(&uncompressed);

        Ok(Self {
            address,
            public_key: compressed,
            private_key,
            chain_code,
            mnemonic: mnemonic_str,
        })
    }

    /// Returns the base64url-encoded mnemonic, the wallet's sole recovery secret.
    pub fn get_recovery_key(&self) -> String {
        base64::engine::general_purpose::URL_SAFE.encode(self.mnemonic.as_bytes())
    }

    /// Returns the recovery key and immediately wipes private material, so
    /// the recovery key can only be read once per in-memory wallet.
    pub fn export_recovery_key(&mut self) -> String {
        let key = self.get_recovery_key();
        self.wipe();
        key
    }

    /// Reconstructs a wallet from a recovery key produced by [`Self::get_recovery_key`].
    pub fn from_recovery_key(recovery_key: &str, passphrase: &str) -> Result<Self, WalletError> {
        let bytes = base64::engine::general_purpose::URL_SAFE
            .decode(recovery_key)
            .map_err(|e| WalletError::RecoveryKey(e.to_string()))?;
        let mnemonic = String::from_utf8(bytes).map_err(|e| WalletError::RecoveryKey(e.to_string()))?;
        Self::new(Some(mnemonic), passphrase, 0, 0)
    }

    /// Compressed public key bytes.
    pub fn public_key(&self) -> &[u8; 33] {
        &self.public_key
    }

    /// Public projection: address and public key, safe to hand to a peer.
    pub fn public_info(&self) -> (String, String) {
        (self.address.clone(), hex::encode(self.public_key))
    }

    /// Signs a `Φx`-prefixed transaction hash, returning `(r, s, v)` as hex
    /// strings with `v` already offset by 27.
    pub fn sign_transaction(&self, tx_hash: &str) -> Result<(String, String, u8), WalletError> {
        let digest = hash_to_digest(tx_hash)?;
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&self.private_key)
            .map_err(|e| WalletError::Signing(format!("invalid private key: {e}")))?;
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| WalletError::Signing(format!("invalid message digest: {e}")))?;

        let signature = secp.sign_ecdsa_recoverable(&message, &secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        let r = hex::encode(&compact[0..32]);
        let s = hex::encode(&compact[32..64]);
        let v = recovery_id.to_i32() as u8 + 27;

        Ok((r, s, v))
    }

    /// Verifies a `(r, s, v)` signature against this wallet's own public key.
    pub fn verify_signature(&self, r: &str, s: &str, v: u8, tx_hash: &str) -> Result<bool, WalletError> {
        verify_signature_against(&self.public_key, r, s, v, tx_hash)
    }

    /// Zeroes private material; the wallet should not be used afterward.
    pub fn wipe(&mut self) {
        self.private_key = [0u8; 32];
        self.chain_code = [0u8; 32];
        self.mnemonic = "x".repeat(99);
        self.public_key = [0u8; 33];
        self.address = format!("{PHI_X}0000000000000000000000000000000000000000");
    }
}

/// Verifies a detached `(r, s, v)` signature against an arbitrary compressed
/// public key, without requiring a [`Wallet`] instance. Used for validating
/// incoming transactions whose signer is not the local wallet.
pub fn verify_signature_against(
    expected_public_key: &[u8; 33],
    r: &str,
    s: &str,
    v: u8,
    tx_hash: &str,
) -> Result<bool, WalletError> {
    if v < 27 {
        return Err(WalletError::Verification(format!("invalid recovery id v={v}")));
    }
    let digest = hash_to_digest(tx_hash)?;

    let r_bytes = hex::decode(r).map_err(|e| WalletError::Verification(format!("invalid r: {e}")))?;
    let s_bytes = hex::decode(s).map_err(|e| WalletError::Verification(format!("invalid s: {e}")))?;
    if r_bytes.len() != 32 || s_bytes.len() != 32 {
        return Err(WalletError::Verification("r/s must each be 32 bytes".to_string()));
    }

    let mut compact = [0u8; 64];
    compact[0..32].copy_from_slice(&r_bytes);
    compact[32..64].copy_from_slice(&s_bytes);

    let recovery_id = RecoveryId::from_i32((v - 27) as i32)
        .map_err(|e| WalletError::Verification(format!("invalid recovery id: {e}")))?;
    let signature = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|e| WalletError::Verification(format!("malformed signature: {e}")))?;

    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(&digest)
        .map_err(|e| WalletError::Verification(format!("invalid message digest: {e}")))?;

    let recovered = secp
        .recover_ecdsa(&message, &signature)
        .map_err(|e| WalletError::Verification(format!("recovery failed: {e}")))?;

    Ok(&recovered.serialize() == expected_public_key)
}

fn hash_to_digest(tx_hash: &str) -> Result<[u8; 32], WalletError> {
    let hex_part = strip_phi_prefix(tx_hash)
        .ok_or_else(|| WalletError::InvalidHash(format!("missing {PHI_X} marker")))?;
    let bytes = hex::decode(hex_part).map_err(|e| WalletError::InvalidHash(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(WalletError::InvalidHash("expected a 32-byte digest".to_string()));
    }
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&bytes);
    Ok(digest)
}

fn derive_master_key(seed: &[u8]) -> ([u8; 32], [u8; 32]) {
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    let mut mac = Hmac::<Sha512>::new_from_slice(b"Bitcoin seed").expect("HMAC accepts any key length");
    mac.update(seed);
    let result = mac.finalize().into_bytes();

    let mut private_key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    private_key.copy_from_slice(&result[0..32]);
    chain_code.copy_from_slice(&result[32..64]);
    (private_key, chain_code)
}

fn derive_bip44_path(
    master_private: [u8; 32],
    master_chain_code: [u8; 32],
    account: u32,
    index: u32,
) -> ([u8; 32], [u8; 32]) {
    let path = [44 | HARDENED, 60 | HARDENED, account | HARDENED, 0, index];

    let (mut private_key, mut chain_code) = (master_private, master_chain_code);
    for component in path {
        let (next_private, next_chain_code) = child_key_derive(&private_key, &chain_code, component);
        private_key = next_private;
        chain_code = next_chain_code;
    }
    (private_key, chain_code)
}

/// Derives the `Φx`-prefixed, EIP-55-style checksummed address from the
/// 65-byte uncompressed public key (dropping its leading `0x04` byte).
fn generate_eth_address(uncompressed_public_key: &[u8; 65]) -> String {
    let keccak_hash = Keccak256::digest(&uncompressed_public_key[1..]);
    let address_bytes = &keccak_hash[keccak_hash.len() - 20..];
    let address_hex = hex::encode(address_bytes);
    checksum_address(&address_hex)
}

fn checksum_address(address_hex: &str) -> String {
    let addr_hash = hex::encode(Keccak256::digest(address_hex.to_lowercase().as_bytes()));
    let mut out = String::with_capacity(address_hex.len() + PHI_X.len());
    out.push_str(PHI_X);
    for (i, c) in address_hex.chars().enumerate() {
        let checksum_nibble = addr_hash.as_bytes()[i];
        let checksum_value = (checksum_nibble as char).to_digit(16).unwrap_or(0);
        if checksum_value > 7 {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_wallet_has_phi_prefixed_address() {
        let wallet = Wallet::new(None, "", 0, 0).expect("wallet generation should succeed");
        assert!(wallet.address.starts_with(PHI_X));
        assert_eq!(wallet.public_key().len(), 33);
    }

    #[test]
    fn recovery_key_roundtrip_preserves_address() {
        let wallet = Wallet::new(None, "", 0, 0).expect("wallet generation should succeed");
        let recovery_key = wallet.get_recovery_key();
        let restored = Wallet::from_recovery_key(&recovery_key, "").expect("restore should succeed");
        assert_eq!(wallet.address, restored.address);
        assert_eq!(wallet.public_key, restored.public_key);
    }

    #[test]
    fn export_recovery_key_wipes_the_wallet() {
        let mut wallet = Wallet::new(None, "", 0, 0).expect("wallet generation should succeed");
        let before_address = wallet.address.clone();
        let _ = wallet.export_recovery_key();
        assert_ne!(wallet.address, before_address);
        assert_eq!(wallet.public_key, [0u8; 33]);
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let wallet = Wallet::new(None, "", 0, 0).expect("wallet generation should succeed");
        let fake_hash = format!("{PHI_X}{}", hex::encode([7u8; 32]));

        let (r, s, v) = wallet.sign_transaction(&fake_hash).expect("signing should succeed");
        let ok = wallet
            .verify_signature(&r, &s, v, &fake_hash)
            .expect("verification should not error");
        assert!(ok);
    }

    #[test]
    fn verification_fails_for_wrong_wallet() {
        let wallet_a = Wallet::new(None, "", 0, 0).expect("wallet generation should succeed");
        let wallet_b = Wallet::new(None, "", 0, 0).expect("wallet generation should succeed");
        let fake_hash = format!("{PHI_X}{}", hex::encode([3u8; 32]));

        let (r, s, v) = wallet_a.sign_transaction(&fake_hash).expect("signing should succeed");
        let ok = wallet_b
            .verify_signature(&r, &s, v, &fake_hash)
            .expect("verification should not error");
        assert!(!ok);
    }

    #[test]
    fn deriving_from_the_same_mnemonic_is_deterministic() {
        let wallet_a = Wallet::new(None, "", 0, 0).expect("wallet generation should succeed");
        let recovery_key = wallet_a.get_recovery_key();

        let wallet_b = Wallet::from_recovery_key(&recovery_key, "").expect("restore should succeed");
        let wallet_c = Wallet::from_recovery_key(&recovery_key, "").expect("restore should succeed");

        assert_eq!(wallet_b.address, wallet_c.address);
    }
}
