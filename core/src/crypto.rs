//! Cryptographic primitives consumed by the rest of the crate.
//!
//! Hashing, signing and key derivation are treated as a narrow external
//! contract (`hash`, `verify`, `pubkey_to_address`) rather than baked into
//! callers. This module is that contract's concrete implementation: Blake2b
//! truncated to 32 bytes for hashing (the same truncation used for block/tx
//! hashes throughout) and Ed25519 for signatures.

use crate::address::Address;
use crate::Hash;
use blake2::{Blake2b512, Digest};
use ed25519_dalek::{PublicKey, Signature, Verifier};
use sha2::{Digest as Sha2Digest, Sha256};

/// Hashes `bytes` to a 32-byte digest.
pub fn hash(bytes: &[u8]) -> Hash {
    let digest = Blake2b512::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}

/// Derives the 20-byte address owning `pubkey`.
pub fn pubkey_to_address(pubkey: &[u8; 32]) -> Address {
    let digest = Sha256::digest(pubkey);
    Address::from_bytes(&digest[..20]).expect("sha256 digest truncation is 20 bytes")
}

/// Verifies an Ed25519 `signature` over `msg` under `pubkey`.
///
/// Malformed keys or signatures are treated as verification failures rather
/// than propagated errors, matching the crypto contract's `verify(..) ->
/// bool` surface.
pub fn verify(pubkey: &[u8; 32], msg: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(pk) = PublicKey::from_bytes(pubkey) else {
        return false;
    };
    let Ok(sig) = Signature::from_bytes(signature) else {
        return false;
    };
    pk.verify(msg, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash(b"obscura"), hash(b"obscura"));
        assert_ne!(hash(b"obscura"), hash(b"obscurb"));
    }

    #[test]
    fn verify_rejects_garbage() {
        assert!(!verify(&[0u8; 32], b"msg", &[0u8; 64]));
    }
}
