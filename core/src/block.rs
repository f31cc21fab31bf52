//! Blocks: headers, interlinks, bodies, and the proof-of-work target
//! encoding shared by all three.
//!
//! The wire-exact header layout is `prevHash || interlinkHash || bodyHash ||
//! accountsHash || nBits || height || timestamp || nonce`, big-endian: four
//! 32-byte hashes plus four 4-byte integers, 144 bytes total (see
//! `DESIGN.md`'s Open Question decisions for the arithmetic).

use crate::address::Address;
use crate::crypto;
use crate::error::{Error, Result};
use crate::transaction::{Transaction, TRANSACTION_WIRE_SIZE};
use crate::Hash;
use serde::{Deserialize, Serialize};

/// Fixed wire size of a [`BlockHeader`]: four 32-byte hashes plus four
/// 4-byte integers.
pub const HEADER_WIRE_SIZE: usize = 32 * 4 + 4 * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub prev_hash: Hash,
    pub interlink_hash: Hash,
    pub body_hash: Hash,
    pub accounts_hash: Hash,
    /// Compact-encoded proof-of-work target.
    pub n_bits: u32,
    pub height: u32,
    pub timestamp: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_WIRE_SIZE] {
        let mut buf = [0u8; HEADER_WIRE_SIZE];
        let mut off = 0;
        for hash in [&self.prev_hash, &self.interlink_hash, &self.body_hash, &self.accounts_hash] {
            buf[off..off + 32].copy_from_slice(hash);
            off += 32;
        }
        for field in [self.n_bits, self.height, self.timestamp, self.nonce] {
            buf[off..off + 4].copy_from_slice(&field.to_be_bytes());
            off += 4;
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HEADER_WIRE_SIZE {
            return Err(Error::InvalidBlock(format!(
                "expected {HEADER_WIRE_SIZE} header bytes, got {}",
                bytes.len()
            )));
        }
        let read_hash = |off: usize| -> Hash {
            let mut h = [0u8; 32];
            h.copy_from_slice(&bytes[off..off + 32]);
            h
        };
        let read_u32 = |off: usize| u32::from_be_bytes(bytes[off..off + 4].try_into().unwrap());
        Ok(Self {
            prev_hash: read_hash(0),
            interlink_hash: read_hash(32),
            body_hash: read_hash(64),
            accounts_hash: read_hash(96),
            n_bits: read_u32(128),
            height: read_u32(132),
            timestamp: read_u32(136),
            nonce: read_u32(140),
        })
    }

    pub fn hash(&self) -> Hash {
        crypto::hash(&self.to_bytes())
    }

    /// True iff `hash()` interpreted as a big-endian integer is `<=` the
    /// target decoded from `n_bits`.
    pub fn verify_proof_of_work(&self) -> bool {
        hash_meets_target(&self.hash(), &compact_to_target(self.n_bits))
    }
}

/// Ordered ancestor hashes at exponentially increasing difficulty levels,
/// used for succinct chain proofs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockInterlink(pub Vec<Hash>);

impl BlockInterlink {
    pub fn hash(&self) -> Hash {
        if self.0.is_empty() {
            return crypto::hash(b"obscura-empty-interlink");
        }
        let mut buf = Vec::with_capacity(self.0.len() * 32);
        for h in &self.0 {
            buf.extend_from_slice(h);
        }
        crypto::hash(&buf)
    }

    /// Deterministically derives the interlink a block extending `parent`
    /// should carry: the parent's hash is recorded at every difficulty
    /// level its own proof-of-work clears. Exact interlink/chain-proof
    /// tuning constants are a network-protocol concern out of scope here
    /// (spec §9); this fixes a simple, deterministic scheme.
    pub fn build_next(parent_hash: Hash, parent_n_bits: u32) -> Self {
        let level = superblock_level(&parent_hash, &compact_to_target(parent_n_bits));
        let mut hashes = Vec::with_capacity(level + 1);
        for _ in 0..=level {
            hashes.push(parent_hash);
        }
        BlockInterlink(hashes)
    }
}

/// Number of difficulty levels above its own target a hash clears: how many
/// times `target` can be halved before it drops below `hash`. Used to decide
/// how many interlink levels a block is recorded at.
fn superblock_level(hash: &Hash, target: &[u8; 32]) -> usize {
    let mut level = 0usize;
    let mut shifted = *target;
    while hash_meets_target(hash, &shifted) && level < 63 {
        shift_right_one_bit(&mut shifted);
        level += 1;
    }
    level.saturating_sub(1)
}

fn shift_right_one_bit(buf: &mut [u8; 32]) {
    let mut carry = 0u8;
    for byte in buf.iter_mut() {
        let new_carry = *byte & 1;
        *byte = (*byte >> 1) | (carry << 7);
        carry = new_carry;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBody {
    pub miner_address: Address,
    pub transactions: Vec<Transaction>,
}

impl BlockBody {
    /// Merkle root over `[minerAddress, tx1, tx2, ...]`, duplicating the
    /// last leaf at each level if that level has an odd count.
    pub fn hash(&self) -> Hash {
        let mut leaves = Vec::with_capacity(1 + self.transactions.len());
        leaves.push(crypto::hash(self.miner_address.as_ref()));
        for tx in &self.transactions {
            leaves.push(tx.hash());
        }
        merkle_root(&leaves)
    }

    /// Wire encoding: `1-byte tx count || txs || miner address (20)`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.transactions.len() > u8::MAX as usize {
            return Err(Error::InvalidBlock("too many transactions for one byte count".into()));
        }
        let mut buf = Vec::with_capacity(1 + self.transactions.len() * TRANSACTION_WIRE_SIZE + 20);
        buf.push(self.transactions.len() as u8);
        for tx in &self.transactions {
            buf.extend_from_slice(&tx.to_bytes());
        }
        buf.extend_from_slice(self.miner_address.as_ref());
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidBlock("empty block body".into()));
        }
        let count = bytes[0] as usize;
        let expected_len = 1 + count * TRANSACTION_WIRE_SIZE + 20;
        if bytes.len() != expected_len {
            return Err(Error::InvalidBlock(format!(
                "expected {expected_len} body bytes, got {}",
                bytes.len()
            )));
        }
        let mut transactions = Vec::with_capacity(count);
        let mut off = 1;
        for _ in 0..count {
            transactions.push(Transaction::from_bytes(&bytes[off..off + TRANSACTION_WIRE_SIZE])?);
            off += TRANSACTION_WIRE_SIZE;
        }
        let miner_address = Address::from_bytes(&bytes[off..off + 20])
            .ok_or_else(|| Error::InvalidBlock("bad miner address".into()))?;
        Ok(Self { miner_address, transactions })
    }
}

/// Binary Merkle root, duplicating the last leaf at odd levels.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let mut buf = Vec::with_capacity(64);
            buf.extend_from_slice(&pair[0]);
            buf.extend_from_slice(if pair.len() == 2 { &pair[1] } else { &pair[0] });
            next.push(crypto::hash(&buf));
        }
        level = next;
    }
    level[0]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub interlink: BlockInterlink,
    /// `None` for header-only propagation.
    pub body: Option<BlockBody>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}

/// Decodes a compact `n_bits` value into a 32-byte big-endian target,
/// Bitcoin-style: the high byte is an exponent (number of significant
/// target bytes), the remaining three are the mantissa.
pub fn compact_to_target(n_bits: u32) -> [u8; 32] {
    let bytes = n_bits.to_be_bytes();
    let exponent = bytes[0] as usize;
    let mantissa = [bytes[1], bytes[2], bytes[3]];
    let mut target = [0u8; 32];
    if exponent <= 3 {
        let shift = 8 * (3 - exponent);
        let mantissa_val = u32::from_be_bytes([0, mantissa[0], mantissa[1], mantissa[2]]) >> shift;
        target[28..32].copy_from_slice(&mantissa_val.to_be_bytes());
    } else if exponent <= 32 {
        let start = 32 - exponent;
        target[start..start + 3].copy_from_slice(&mantissa);
    }
    target
}

/// Encodes a 32-byte big-endian target into its compact `n_bits` form.
pub fn target_to_compact(target: &[u8; 32]) -> u32 {
    match target.iter().position(|&b| b != 0) {
        None => 0,
        Some(idx) => {
            let exponent = (32 - idx) as u32;
            let mantissa = [
                target[idx],
                *target.get(idx + 1).unwrap_or(&0),
                *target.get(idx + 2).unwrap_or(&0),
            ];
            (exponent << 24) | u32::from_be_bytes([0, mantissa[0], mantissa[1], mantissa[2]])
        }
    }
}

/// True iff `hash`, read as a big-endian integer, is `<= target`.
pub fn hash_meets_target(hash: &Hash, target: &[u8; 32]) -> bool {
    hash.as_slice() <= target.as_slice()
}

/// Relative PoW weight of a target: an approximation of `max_target /
/// target`, precise enough to total and compare across a branch but not
/// intended to match a particular network's exact difficulty-1 reference.
pub fn difficulty(target: &[u8; 32]) -> u128 {
    let max_target = compact_to_target(0x1f00_ffff);
    let max = u128::from_be_bytes(max_target[0..16].try_into().unwrap()).max(1);
    let cur = u128::from_be_bytes(target[0..16].try_into().unwrap()).max(1);
    (max / cur).max(1)
}
