//! The authenticated accounts tree: a radix-16 patricia trie over
//! `Address -> Account`, keyed by the 40-nibble path of the address.
//!
//! Nodes are content-addressed (stored by the hash of their canonical
//! serialization) so that a mutation only needs to rewrite the nodes on the
//! path from the changed leaf to the root: the same logical mapping always
//! hashes the same way, regardless of insertion order or representation
//! history. Branch nodes are kept free of single-child degeneracy and
//! terminals never hold a zero account, by splitting/merging on every put.

use crate::account::Account;
use crate::address::{Address, ADDRESS_NIBBLES};
use crate::crypto;
use crate::error::{Error, Result};
use crate::store::{key, KvStore, KvTransaction};
use crate::Hash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountsTreeNode {
    Branch {
        prefix: Vec<u8>,
        /// 16 child slots, indexed by nibble; each holds the child's
        /// content hash and the nibble-edge label leading to it.
        children: Vec<Option<(Hash, Vec<u8>)>>,
    },
    Terminal {
        prefix: Vec<u8>,
        account: Account,
    },
}

impl AccountsTreeNode {
    fn branch(prefix: Vec<u8>) -> Self {
        AccountsTreeNode::Branch { prefix, children: vec![None; 16] }
    }

    fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("accounts tree node is serializable")
    }

    fn decode(bytes: &[u8]) -> Self {
        bincode::deserialize(bytes).expect("stored accounts tree node is well-formed")
    }

    fn hash(&self) -> Hash {
        crypto::hash(&self.encode())
    }
}

/// Sentinel root hash for a tree holding no accounts.
pub fn empty_root_hash() -> Hash {
    crypto::hash(b"obscura-empty-accounts-tree")
}

fn node_key(hash: &Hash) -> Vec<u8> {
    key::accounts_tree_node(&hex::encode(hash))
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Resolves a node by hash, checking the overlay (pending writes of an open
/// transaction) before falling back to the committed store.
fn resolve_node<S: KvStore>(
    store: &S,
    overlay: Option<&HashMap<Hash, AccountsTreeNode>>,
    hash: &Hash,
) -> Option<AccountsTreeNode> {
    if let Some(overlay) = overlay {
        if let Some(node) = overlay.get(hash) {
            return Some(node.clone());
        }
    }
    store.get(&node_key(hash)).map(|bytes| AccountsTreeNode::decode(&bytes))
}

/// Authenticated accounts tree over a [`KvStore`].
pub struct AccountsTree<S: KvStore> {
    store: Arc<S>,
    root: RwLock<Option<Hash>>,
    tx_open: Arc<AtomicBool>,
}

impl<S: KvStore> AccountsTree<S> {
    pub fn new(store: Arc<S>) -> Self {
        let root = store.get(&key::accounts_tree_root()).map(|bytes| {
            let mut h = [0u8; 32];
            h.copy_from_slice(&bytes);
            h
        });
        Self { store, root: RwLock::new(root), tx_open: Arc::new(AtomicBool::new(false)) }
    }

    /// Root hash of the committed tree; the empty-root sentinel if no
    /// accounts have ever been stored.
    pub fn hash(&self) -> Hash {
        self.root.read().unwrap().unwrap_or_else(empty_root_hash)
    }

    pub fn get(&self, addr: &Address) -> Account {
        let root = *self.root.read().unwrap();
        descend(&*self.store, None, root, &addr.nibbles())
    }

    /// Opens a scoped write overlay. Only one transaction may be open at a
    /// time; a second concurrent attempt returns [`Error::TxBusy`].
    pub fn begin_transaction(&self) -> Result<AccountsTreeTransaction<'_, S>> {
        if self.tx_open.swap(true, Ordering::AcqRel) {
            return Err(Error::TxBusy);
        }
        let root = *self.root.read().unwrap();
        Ok(AccountsTreeTransaction {
            tree: self,
            overlay: HashMap::new(),
            working_root: root,
            finalized: false,
        })
    }
}

fn descend<S: KvStore>(
    store: &S,
    overlay: Option<&HashMap<Hash, AccountsTreeNode>>,
    root: Option<Hash>,
    key_nibbles: &[u8],
) -> Account {
    let Some(root_hash) = root else {
        return Account::zero();
    };
    let mut current = resolve_node(store, overlay, &root_hash);
    let mut remaining = key_nibbles;
    loop {
        match current {
            None => return Account::zero(),
            Some(AccountsTreeNode::Terminal { prefix, account }) => {
                return if prefix == remaining { account } else { Account::zero() };
            }
            Some(AccountsTreeNode::Branch { prefix, children }) => {
                if remaining.len() < prefix.len() || &remaining[..prefix.len()] != prefix.as_slice() {
                    return Account::zero();
                }
                remaining = &remaining[prefix.len()..];
                if remaining.is_empty() {
                    return Account::zero();
                }
                let nibble = remaining[0] as usize;
                remaining = &remaining[1..];
                match &children[nibble] {
                    None => return Account::zero(),
                    Some((child_hash, _)) => {
                        current = resolve_node(store, overlay, child_hash);
                    }
                }
            }
        }
    }
}

/// A scoped, buffered write overlay over an [`AccountsTree`]. Writes are
/// invisible to the outside world until [`Self::commit`] publishes them;
/// dropping the transaction without committing aborts it, releasing the
/// single-writer lock.
pub struct AccountsTreeTransaction<'t, S: KvStore> {
    tree: &'t AccountsTree<S>,
    overlay: HashMap<Hash, AccountsTreeNode>,
    working_root: Option<Hash>,
    finalized: bool,
}

impl<'t, S: KvStore> AccountsTreeTransaction<'t, S> {
    /// Root hash the tree would have if committed right now.
    pub fn root_hash(&self) -> Hash {
        self.working_root.unwrap_or_else(empty_root_hash)
    }

    pub fn get(&self, addr: &Address) -> Account {
        descend(&*self.tree.store, Some(&self.overlay), self.working_root, &addr.nibbles())
    }

    /// Inserts, replaces, or (if `account` is the zero account) deletes the
    /// entry for `addr`.
    pub fn put(&mut self, addr: &Address, account: Account) {
        let nibbles = addr.nibbles();
        self.working_root = self.insert_at(self.working_root, &nibbles, account);
    }

    fn fetch(&self, hash: &Hash) -> AccountsTreeNode {
        resolve_node(&*self.tree.store, Some(&self.overlay), hash)
            .expect("accounts tree node referenced by a live hash must exist")
    }

    fn store_node(&mut self, node: AccountsTreeNode) -> Hash {
        let hash = node.hash();
        self.overlay.insert(hash, node);
        hash
    }

    fn insert_at(&mut self, node: Option<Hash>, key_nibbles: &[u8], account: Account) -> Option<Hash> {
        let Some(node_hash) = node else {
            if account.is_zero() {
                return None;
            }
            return Some(self.store_node(AccountsTreeNode::Terminal {
                prefix: key_nibbles.to_vec(),
                account,
            }));
        };

        match self.fetch(&node_hash) {
            AccountsTreeNode::Terminal { prefix, account: existing } => {
                if prefix == key_nibbles {
                    if account.is_zero() {
                        None
                    } else {
                        Some(self.store_node(AccountsTreeNode::Terminal { prefix, account }))
                    }
                } else if account.is_zero() {
                    // Deleting a key that is not present: no-op.
                    Some(node_hash)
                } else {
                    Some(self.split_terminal(prefix, existing, key_nibbles, account))
                }
            }
            AccountsTreeNode::Branch { prefix, mut children } => {
                let cp = common_prefix_len(&prefix, key_nibbles);
                if cp < prefix.len() {
                    if account.is_zero() {
                        return Some(node_hash);
                    }
                    return Some(self.split_branch(prefix, children, key_nibbles, account));
                }
                let rest = &key_nibbles[prefix.len()..];
                debug_assert!(!rest.is_empty(), "branch prefixes never span a full address");
                let nibble = rest[0] as usize;
                let child_key = &rest[1..];
                match children[nibble].take() {
                    None => {
                        if account.is_zero() {
                            children[nibble] = None;
                            Some(self.store_node(AccountsTreeNode::Branch { prefix, children }))
                        } else {
                            let hash = self.store_node(AccountsTreeNode::Terminal {
                                prefix: child_key.to_vec(),
                                account,
                            });
                            children[nibble] = Some((hash, child_key.to_vec()));
                            Some(self.store_node(AccountsTreeNode::Branch { prefix, children }))
                        }
                    }
                    Some((child_hash, _)) => {
                        match self.insert_at(Some(child_hash), child_key, account) {
                            None => {
                                children[nibble] = None;
                                self.collapse_branch(prefix, children)
                            }
                            Some(new_child_hash) => {
                                children[nibble] = Some((new_child_hash, child_key.to_vec()));
                                Some(self.store_node(AccountsTreeNode::Branch { prefix, children }))
                            }
                        }
                    }
                }
            }
        }
    }

    /// Splits a terminal into a branch when a diverging key is inserted
    /// under it. The resulting branch always has exactly two children.
    fn split_terminal(
        &mut self,
        prefix: Vec<u8>,
        existing_account: Account,
        key_nibbles: &[u8],
        new_account: Account,
    ) -> Hash {
        let cp = common_prefix_len(&prefix, key_nibbles);
        let common = prefix[..cp].to_vec();
        let existing_edge = prefix[cp + 1..].to_vec();
        let new_edge = key_nibbles[cp + 1..].to_vec();
        let existing_hash = self.store_node(AccountsTreeNode::Terminal { prefix: existing_edge.clone(), account: existing_account });
        let new_hash = self.store_node(AccountsTreeNode::Terminal { prefix: new_edge.clone(), account: new_account });
        let mut branch = AccountsTreeNode::branch(common);
        if let AccountsTreeNode::Branch { ref mut children, .. } = branch {
            children[prefix[cp] as usize] = Some((existing_hash, existing_edge));
            children[key_nibbles[cp] as usize] = Some((new_hash, new_edge));
        }
        self.store_node(branch)
    }

    /// Splits a branch when a key diverges from its own prefix before
    /// reaching its first branching nibble.
    fn split_branch(
        &mut self,
        prefix: Vec<u8>,
        children: Vec<Option<(Hash, Vec<u8>)>>,
        key_nibbles: &[u8],
        new_account: Account,
    ) -> Hash {
        let cp = common_prefix_len(&prefix, key_nibbles);
        let common = prefix[..cp].to_vec();
        let relabeled_edge = prefix[cp + 1..].to_vec();
        let relabeled_hash = self.store_node(AccountsTreeNode::Branch { prefix: relabeled_edge.clone(), children });
        let new_edge = key_nibbles[cp + 1..].to_vec();
        let new_hash = self.store_node(AccountsTreeNode::Terminal { prefix: new_edge.clone(), account: new_account });
        let mut top = AccountsTreeNode::branch(common);
        if let AccountsTreeNode::Branch { ref mut children, .. } = top {
            children[prefix[cp] as usize] = Some((relabeled_hash, relabeled_edge));
            children[key_nibbles[cp] as usize] = Some((new_hash, new_edge));
        }
        self.store_node(top)
    }

    /// After removing a child, collapses a branch that now has at most one
    /// remaining child so no branch is ever left with fewer than two.
    fn collapse_branch(&mut self, prefix: Vec<u8>, children: Vec<Option<(Hash, Vec<u8>)>>) -> Option<Hash> {
        let remaining: Vec<(usize, Hash, Vec<u8>)> = children
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|(h, e)| (i, *h, e.clone())))
            .collect();
        match remaining.len() {
            0 => None,
            1 => {
                let (nibble, child_hash, child_edge) = remaining.into_iter().next().unwrap();
                let mut merged_prefix = prefix;
                merged_prefix.push(nibble as u8);
                merged_prefix.extend_from_slice(&child_edge);
                let merged = match self.fetch(&child_hash) {
                    AccountsTreeNode::Terminal { account, .. } => {
                        AccountsTreeNode::Terminal { prefix: merged_prefix, account }
                    }
                    AccountsTreeNode::Branch { children, .. } => {
                        AccountsTreeNode::Branch { prefix: merged_prefix, children }
                    }
                };
                Some(self.store_node(merged))
            }
            _ => Some(self.store_node(AccountsTreeNode::Branch { prefix, children })),
        }
    }

    /// Publishes every node written during the transaction plus the new
    /// root pointer, atomically.
    pub fn commit(mut self) -> Hash {
        self.finalized = true;
        let mut kv_tx = self.tree.store.begin_tx();
        for (hash, node) in self.overlay.drain() {
            kv_tx.put(&node_key(&hash), &node.encode());
        }
        match self.working_root {
            Some(root) => kv_tx.put(&key::accounts_tree_root(), &root),
            None => kv_tx.delete(&key::accounts_tree_root()),
        }
        kv_tx.commit();
        *self.tree.root.write().unwrap() = self.working_root;
        self.tree.tx_open.store(false, Ordering::Release);
        self.root_hash()
    }

    /// Like [`Self::commit`], but writes into an already-open `kv_tx`
    /// instead of opening and committing its own, so the caller can bundle
    /// these writes atomically with others (e.g. chain-data and head
    /// updates for the same block). The caller owns committing or aborting
    /// `kv_tx`.
    pub fn stage(mut self, kv_tx: &mut S::Tx) -> Hash {
        self.finalized = true;
        for (hash, node) in self.overlay.drain() {
            kv_tx.put(&node_key(&hash), &node.encode());
        }
        match self.working_root {
            Some(root) => kv_tx.put(&key::accounts_tree_root(), &root),
            None => kv_tx.delete(&key::accounts_tree_root()),
        }
        *self.tree.root.write().unwrap() = self.working_root;
        self.tree.tx_open.store(false, Ordering::Release);
        self.root_hash()
    }

    /// Discards all buffered writes.
    pub fn abort(mut self) {
        self.finalized = true;
        self.tree.tx_open.store(false, Ordering::Release);
    }
}

impl<'t, S: KvStore> Drop for AccountsTreeTransaction<'t, S> {
    fn drop(&mut self) {
        if !self.finalized {
            self.tree.tx_open.store(false, Ordering::Release);
        }
    }
}
