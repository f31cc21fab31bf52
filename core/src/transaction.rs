//! Transactions.
//!
//! Wire layout (bit-exact, matching the existing network's canonical byte
//! order, §6 of the node spec):
//!
//! ```text
//! sender pubkey (32) || recipient (20) || value (u64 BE) || fee (u64 BE)
//!     || nonce (u32 BE) || signature (64)
//! ```
//!
//! The signing message is the same encoding with the signature bytes zeroed
//! out, so a signature never covers itself.

use crate::address::{Address, ADDRESS_LEN};
use crate::crypto;
use crate::error::{Error, Result};
use crate::Hash;
use serde::{Deserialize, Serialize};

pub const TRANSACTION_WIRE_SIZE: usize = 32 + ADDRESS_LEN + 8 + 8 + 4 + 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender_public_key: [u8; 32],
    pub recipient: Address,
    pub value: u64,
    pub fee: u64,
    pub nonce: u32,
    pub signature: [u8; 64],
}

impl Transaction {
    /// The address debited by this transaction, derived from the sender's
    /// public key.
    pub fn sender(&self) -> Address {
        crypto::pubkey_to_address(&self.sender_public_key)
    }

    /// Total amount debited from the sender: `value + fee`.
    pub fn total_debit(&self) -> Option<u64> {
        self.value.checked_add(self.fee)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(TRANSACTION_WIRE_SIZE);
        buf.extend_from_slice(&self.sender_public_key);
        buf.extend_from_slice(self.recipient.as_ref());
        buf.extend_from_slice(&self.value.to_be_bytes());
        buf.extend_from_slice(&self.fee.to_be_bytes());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(&self.signature);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TRANSACTION_WIRE_SIZE {
            return Err(Error::InvalidTx(format!(
                "expected {TRANSACTION_WIRE_SIZE} transaction bytes, got {}",
                bytes.len()
            )));
        }
        let mut sender_public_key = [0u8; 32];
        sender_public_key.copy_from_slice(&bytes[0..32]);
        let recipient = Address::from_bytes(&bytes[32..32 + ADDRESS_LEN])
            .ok_or_else(|| Error::InvalidTx("bad recipient address".into()))?;
        let mut off = 32 + ADDRESS_LEN;
        let value = u64::from_be_bytes(bytes[off..off + 8].try_into().unwrap());
        off += 8;
        let fee = u64::from_be_bytes(bytes[off..off + 8].try_into().unwrap());
        off += 8;
        let nonce = u32::from_be_bytes(bytes[off..off + 4].try_into().unwrap());
        off += 4;
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&bytes[off..off + 64]);
        Ok(Self { sender_public_key, recipient, value, fee, nonce, signature })
    }

    /// The deterministic message a sender signs: the wire encoding with the
    /// signature zeroed, so the signature does not cover itself.
    pub fn signing_message(&self) -> Vec<u8> {
        let mut unsigned = self.clone();
        unsigned.signature = [0u8; 64];
        unsigned.to_bytes()
    }

    /// Transaction identifier: hash of the canonical wire encoding.
    pub fn hash(&self) -> Hash {
        crypto::hash(&self.to_bytes())
    }

    /// Verifies the signature over [`Self::signing_message`].
    pub fn verify_signature(&self) -> bool {
        crypto::verify(&self.sender_public_key, &self.signing_message(), &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Keypair, SecretKey, Signer};

    fn signed_tx(secret_byte: u8, recipient: Address, value: u64, fee: u64, nonce: u32) -> Transaction {
        let secret = SecretKey::from_bytes(&[secret_byte; 32]).unwrap();
        let public = ed25519_dalek::PublicKey::from(&secret);
        let keypair = Keypair { secret, public };
        let mut tx = Transaction {
            sender_public_key: keypair.public.to_bytes(),
            recipient,
            value,
            fee,
            nonce,
            signature: [0u8; 64],
        };
        let sig = keypair.sign(&tx.signing_message());
        tx.signature = sig.to_bytes();
        tx
    }

    #[test]
    fn wire_roundtrip() {
        let recipient = Address([7u8; ADDRESS_LEN]);
        let tx = signed_tx(1, recipient, 100, 1, 0);
        let bytes = tx.to_bytes();
        assert_eq!(bytes.len(), TRANSACTION_WIRE_SIZE);
        let decoded = Transaction::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn signature_verifies() {
        let recipient = Address([7u8; ADDRESS_LEN]);
        let tx = signed_tx(2, recipient, 50, 1, 3);
        assert!(tx.verify_signature());
    }

    #[test]
    fn tampered_signature_fails() {
        let recipient = Address([7u8; ADDRESS_LEN]);
        let mut tx = signed_tx(3, recipient, 50, 1, 3);
        tx.value += 1;
        assert!(!tx.verify_signature());
    }
}
