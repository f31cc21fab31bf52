//! Account addresses.
//!
//! An [`Address`] is the 20-byte identifier derived from a public key (see
//! [`crate::crypto::pubkey_to_address`]). It doubles as the key type for the
//! accounts tree, where it is walked one hex nibble at a time.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const ADDRESS_LEN: usize = 20;

/// Number of nibbles (hex digits) in an address; the depth of the patricia
/// trie from root to any terminal.
pub const ADDRESS_NIBBLES: usize = ADDRESS_LEN * 2;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ADDRESS_LEN {
            return None;
        }
        let mut buf = [0u8; ADDRESS_LEN];
        buf.copy_from_slice(bytes);
        Some(Self(buf))
    }

    /// Splits the address into its 40 nibbles, most significant first, for
    /// walking the accounts tree.
    pub fn nibbles(&self) -> [u8; ADDRESS_NIBBLES] {
        let mut out = [0u8; ADDRESS_NIBBLES];
        for (i, byte) in self.0.iter().enumerate() {
            out[i * 2] = byte >> 4;
            out[i * 2 + 1] = byte & 0x0f;
        }
        out
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
