//! Account state.
//!
//! An [`Account`] is a balance/nonce pair. A non-existent address is
//! semantically the zero account `(0, 0)`; the accounts tree prunes zero
//! accounts rather than storing them explicitly, so `hash()` is identical
//! whether an address was ever touched or not.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    pub balance: u64,
    pub nonce: u32,
}

impl Account {
    pub const fn zero() -> Self {
        Self { balance: 0, nonce: 0 }
    }

    pub fn is_zero(&self) -> bool {
        self.balance == 0 && self.nonce == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_account_is_zero() {
        assert!(Account::default().is_zero());
        assert!(!Account { balance: 1, nonce: 0 }.is_zero());
    }
}
