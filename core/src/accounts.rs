//! The accounts façade: applies or reverts a block body's transactions and
//! coinbase against the accounts tree under a single scoped transaction.

use crate::account::Account;
use crate::accounts_tree::{AccountsTree, AccountsTreeTransaction};
use crate::block::BlockBody;
use crate::config::Policy;
use crate::error::{Error, Result};
use crate::store::KvStore;
use crate::Hash;
use std::sync::Arc;

pub struct Accounts<S: KvStore> {
    tree: AccountsTree<S>,
}

impl<S: KvStore> Accounts<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { tree: AccountsTree::new(store) }
    }

    pub fn hash(&self) -> Hash {
        self.tree.hash()
    }

    pub fn get(&self, addr: &crate::address::Address) -> Account {
        self.tree.get(addr)
    }

    /// Opens a scoped transaction that can apply/revert one or more block
    /// bodies before being committed or aborted as a single unit — the
    /// mechanism rebranching uses to keep all of its tree mutations atomic:
    /// either every block on the new path applies, or none of them do.
    pub fn begin_transaction(&self) -> Result<AccountsTransaction<'_, S>> {
        Ok(AccountsTransaction { inner: self.tree.begin_transaction()? })
    }
}

pub struct AccountsTransaction<'t, S: KvStore> {
    inner: AccountsTreeTransaction<'t, S>,
}

impl<'t, S: KvStore> AccountsTransaction<'t, S> {
    pub fn root_hash(&self) -> Hash {
        self.inner.root_hash()
    }

    /// Applies `body`'s transactions (in canonical/serialized order) and
    /// coinbase against the overlay, returning the resulting root hash.
    /// Does not publish anything to the store; call [`Self::commit`] for
    /// that.
    pub fn commit_block_body(&mut self, body: &BlockBody, height: u32, policy: &Policy) -> Result<Hash> {
        let mut fee_total: u64 = 0;
        for tx in &body.transactions {
            if !tx.verify_signature() {
                return Err(Error::InvalidTx("signature does not verify".into()));
            }
            let sender = tx.sender();
            if sender == tx.recipient && tx.value != 0 {
                return Err(Error::InvalidTx("self-transfer with nonzero value".into()));
            }

            let mut sender_account = self.inner.get(&sender);
            let debit = tx
                .total_debit()
                .ok_or_else(|| Error::InvalidTx("value + fee overflow".into()))?;
            if sender_account.balance < debit {
                return Err(Error::InvalidTx(format!("{sender} has insufficient balance")));
            }
            if tx.nonce != sender_account.nonce {
                return Err(Error::InvalidTx(format!(
                    "{sender} nonce mismatch: tx has {}, account has {}",
                    tx.nonce, sender_account.nonce
                )));
            }
            sender_account.balance -= debit;
            sender_account.nonce = sender_account
                .nonce
                .checked_add(1)
                .ok_or_else(|| Error::InvalidTx("nonce overflow".into()))?;
            self.inner.put(&sender, sender_account);

            let mut recipient_account = self.inner.get(&tx.recipient);
            recipient_account.balance = recipient_account
                .balance
                .checked_add(tx.value)
                .ok_or_else(|| Error::InvalidTx("recipient balance overflow".into()))?;
            self.inner.put(&tx.recipient, recipient_account);

            fee_total = fee_total
                .checked_add(tx.fee)
                .ok_or_else(|| Error::InvalidTx("fee total overflow".into()))?;
        }

        let reward = policy
            .block_reward(height)
            .checked_add(fee_total)
            .ok_or_else(|| Error::InvalidTx("coinbase reward overflow".into()))?;
        let mut miner_account = self.inner.get(&body.miner_address);
        miner_account.balance = miner_account
            .balance
            .checked_add(reward)
            .ok_or_else(|| Error::InvalidTx("miner balance overflow".into()))?;
        self.inner.put(&body.miner_address, miner_account);

        Ok(self.inner.root_hash())
    }

    /// Inverse of [`Self::commit_block_body`]: undoes the coinbase, then
    /// each transaction in reverse order.
    pub fn revert_block_body(&mut self, body: &BlockBody, height: u32, policy: &Policy) -> Result<Hash> {
        let fee_total: u64 = body.transactions.iter().map(|tx| tx.fee).sum();
        let reward = policy.block_reward(height) + fee_total;
        let mut miner_account = self.inner.get(&body.miner_address);
        miner_account.balance = miner_account
            .balance
            .checked_sub(reward)
            .ok_or_else(|| Error::StorageFailure("miner balance underflow on revert".into()))?;
        self.inner.put(&body.miner_address, miner_account);

        for tx in body.transactions.iter().rev() {
            let sender = tx.sender();

            let mut recipient_account = self.inner.get(&tx.recipient);
            recipient_account.balance = recipient_account
                .balance
                .checked_sub(tx.value)
                .ok_or_else(|| Error::StorageFailure("recipient balance underflow on revert".into()))?;
            self.inner.put(&tx.recipient, recipient_account);

            let mut sender_account = self.inner.get(&sender);
            sender_account.balance = sender_account
                .balance
                .checked_add(tx.value + tx.fee)
                .ok_or_else(|| Error::StorageFailure("sender balance overflow on revert".into()))?;
            sender_account.nonce = sender_account
                .nonce
                .checked_sub(1)
                .ok_or_else(|| Error::StorageFailure("sender nonce underflow on revert".into()))?;
            self.inner.put(&sender, sender_account);
        }

        Ok(self.inner.root_hash())
    }

    /// Publishes the transaction's accumulated mutations to the store.
    pub fn commit(self) -> Hash {
        self.inner.commit()
    }

    /// Stages the transaction's accumulated mutations into an
    /// externally-managed KV transaction instead of committing its own, so
    /// they land atomically alongside other writes (e.g. chain-data and
    /// head-pointer updates for the same block).
    pub fn stage(self, kv_tx: &mut S::Tx) -> Hash {
        self.inner.stage(kv_tx)
    }

    pub fn abort(self) {
        self.inner.abort()
    }
}
