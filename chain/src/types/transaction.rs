//! The transaction record: a signed transfer of native balance or of an
//! NFT identified by `contract_code`.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::hash::phi_sha256;

/// A signed transfer, optionally scoped to a `contract_code`-identified NFT.
///
/// `hash` covers only the content fields (`sender`, `receiver`, `amount`,
/// `contract_code`, `timestamp`, `nonce`); the signature triple and public
/// key ride alongside it but are never part of what gets hashed and signed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    pub contract_code: Option<String>,
    pub timestamp: f64,
    pub nonce: u64,
    #[serde(default)]
    pub r: Option<String>,
    #[serde(default)]
    pub s: Option<String>,
    #[serde(default)]
    pub v: Option<u8>,
    #[serde(default)]
    pub public_key: Option<String>,
    pub hash: String,
}

impl Transaction {
    /// Builds a new, unsigned transaction with a freshly computed hash.
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: f64,
        contract_code: Option<String>,
        nonce: u64,
    ) -> Self {
        let timestamp = current_unix_timestamp();
        let mut tx = Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            contract_code,
            timestamp,
            nonce,
            r: None,
            s: None,
            v: None,
            public_key: None,
            hash: String::new(),
        };
        tx.hash = tx.calculate_hash();
        tx
    }

    /// Recomputes the content hash, ignoring signature fields.
    ///
    /// Field order matches the sorted-key JSON object the original source
    /// hashes (`json.dumps(..., sort_keys=True)`); contract_code renders as
    /// the JSON literal `null` when absent, just as the original leaves it
    /// unset.
    pub fn calculate_hash(&self) -> String {
        let contract_code = match &self.contract_code {
            Some(c) => format!("\"{c}\""),
            None => "null".to_string(),
        };
        let body = format!(
            "{{\"amount\": {}, \"contract_code\": {}, \"nonce\": {}, \"receiver\": \"{}\", \"sender\": \"{}\", \"timestamp\": {}}}",
            format_number(self.amount),
            contract_code,
            self.nonce,
            self.receiver,
            self.sender,
            format_number(self.timestamp),
        );
        phi_sha256(body.as_bytes())
    }

    /// Attaches a signature produced by [`crate::wallet::Wallet::sign_transaction`].
    pub fn attach_signature(&mut self, r: String, s: String, v: u8, public_key: String) {
        self.r = Some(r);
        self.s = Some(s);
        self.v = Some(v);
        self.public_key = Some(public_key);
    }

    /// `true` once a full `(r, s, v, public_key)` tuple is attached.
    pub fn is_signed(&self) -> bool {
        self.r.is_some() && self.s.is_some() && self.v.is_some() && self.public_key.is_some()
    }
}

fn format_number(v: f64) -> String {
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
    fn hash_is_deterministic_for_same_content() {
        let mut a = Transaction::new("Φxaaa", "Φxbbb", 1.5, None, 0);
        a.timestamp = 1_700_000_000.0;
        a.hash = a.calculate_hash();

        let mut b = a.clone();
        b.hash = b.calculate_hash();

        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn hash_changes_with_amount() {
        let mut a = Transaction::new("Φxaaa", "Φxbbb", 1.0, None, 0);
        a.timestamp = 1_700_000_000.0;
        a.hash = a.calculate_hash();

        let mut b = a.clone();
        b.amount = 2.0;
        b.hash = b.calculate_hash();

        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn signature_fields_do_not_affect_hash() {
        let mut tx = Transaction::new("Φxaaa", "Φxbbb", 1.0, None, 3);
        tx.hash = tx.calculate_hash();
        let before = tx.hash.clone();
        tx.attach_signature("r".into(), "s".into(), 27, "pub".into());
        assert_eq!(tx.calculate_hash(), before);
        assert!(tx.is_signed());
    }

    #[test]
    fn contract_code_renders_as_null_when_absent() {
        let mut with_code = Transaction::new("Φxaaa", "Φxbbb", 1.0, Some("nft-1".into()), 0);
        with_code.timestamp = 1.0;
        with_code.hash = with_code.calculate_hash();

        let mut without_code = Transaction::new("Φxaaa", "Φxbbb", 1.0, None, 0);
        without_code.timestamp = 1.0;
        without_code.hash = without_code.calculate_hash();

        assert_ne!(with_code.hash, without_code.hash);
    }
}
