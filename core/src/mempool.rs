//! Pending-transaction pool: nonce/balance-aware admission, fee-ordered
//! retrieval, and reactive re-validation on chain head changes. Grounded on
//! the reference mempool's `mempool_update`/`get_transactions_for_block`
//! split, adapted to this crate's single-writer, lock-free-read style.

use crate::address::Address;
use crate::blockchain::FullChain;
use crate::config::Policy;
use crate::events::{Event, EventSender};
use crate::store::KvStore;
use crate::transaction::{Transaction, TRANSACTION_WIRE_SIZE};
use crate::Hash;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    Added,
    Known,
    Invalid(String),
}

struct MempoolState {
    by_hash: HashMap<Hash, Transaction>,
    /// Per-sender pending nonces, kept contiguous with the account's
    /// on-chain nonce by construction.
    by_sender: HashMap<Address, BTreeMap<u32, Hash>>,
}

impl MempoolState {
    fn new() -> Self {
        Self { by_hash: HashMap::new(), by_sender: HashMap::new() }
    }

    fn insert(&mut self, sender: Address, tx: Transaction) {
        let hash = tx.hash();
        self.by_sender.entry(sender).or_default().insert(tx.nonce, hash);
        self.by_hash.insert(hash, tx);
    }

    fn remove(&mut self, hash: &Hash) {
        let Some(tx) = self.by_hash.remove(hash) else { return };
        let sender = tx.sender();
        if let Some(nonces) = self.by_sender.get_mut(&sender) {
            nonces.retain(|_, h| h != hash);
            if nonces.is_empty() {
                self.by_sender.remove(&sender);
            }
        }
    }
}

pub struct Mempool<S: KvStore> {
    chain: Arc<FullChain<S>>,
    policy: Policy,
    events: EventSender,
    state: RwLock<MempoolState>,
}

impl<S: KvStore> Mempool<S> {
    pub fn new(chain: Arc<FullChain<S>>, policy: Policy, events: EventSender) -> Self {
        Self { chain, policy, events, state: RwLock::new(MempoolState::new()) }
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.state.read().unwrap().by_hash.contains_key(hash)
    }

    /// Admits `tx` if its signature verifies, its fee clears the relay
    /// minimum, and it is nonce-contiguous and affordable alongside the
    /// sender's already-pending transactions.
    pub fn push_transaction(&self, tx: Transaction) -> PushResult {
        let hash = tx.hash();
        if self.state.read().unwrap().by_hash.contains_key(&hash) {
            return PushResult::Known;
        }
        if tx.value == 0 {
            return PushResult::Invalid("zero value transaction".into());
        }
        if tx.fee < self.policy.min_relay_fee {
            return PushResult::Invalid("fee below minimum relay fee".into());
        }
        if !tx.verify_signature() {
            return PushResult::Invalid("bad signature".into());
        }
        let Some(debit) = tx.total_debit() else {
            return PushResult::Invalid("value + fee overflow".into());
        };

        let sender = tx.sender();
        let account = self.chain.accounts().get(&sender);

        let mut state = self.state.write().unwrap();
        let (pending_count, pending_total) = match state.by_sender.get(&sender) {
            None => (0u32, 0u64),
            Some(nonces) => (
                nonces.len() as u32,
                nonces
                    .values()
                    .filter_map(|h| state.by_hash.get(h))
                    .filter_map(|t| t.total_debit())
                    .sum(),
            ),
        };

        if tx.nonce != account.nonce + pending_count {
            return PushResult::Invalid("nonce is not contiguous with pending transactions".into());
        }
        let cumulative = pending_total.saturating_add(debit);
        if cumulative > account.balance {
            return PushResult::Invalid("insufficient balance for pending and new transactions".into());
        }

        state.insert(sender, tx);
        drop(state);
        log::debug!("admitted transaction {} from {sender}", hex::encode(hash));
        let _ = self.events.send(Event::TransactionAdded { hash });
        PushResult::Added
    }

    /// Returns up to `max_count` pending transactions ordered by fee-per-byte
    /// descending, then `(sender, nonce)`. Per sender, only a nonce-contiguous
    /// prefix of its pending set is ever returned — equivalent to merging
    /// each sender's nonce-ordered queue by picking the richest available
    /// head on every step.
    pub fn get_transactions(&self, max_count: usize) -> Vec<Transaction> {
        let state = self.state.read().unwrap();
        let mut queues: Vec<(Address, Vec<Hash>, usize)> = state
            .by_sender
            .iter()
            .map(|(addr, nonces)| (*addr, nonces.values().cloned().collect(), 0usize))
            .collect();
        queues.sort_by_key(|(addr, _, _)| *addr);

        let mut out = Vec::with_capacity(max_count.min(state.by_hash.len()));
        while out.len() < max_count {
            let mut best: Option<(usize, f64)> = None;
            for (i, (_, hashes, ptr)) in queues.iter().enumerate() {
                let Some(hash) = hashes.get(*ptr) else { continue };
                let tx = &state.by_hash[hash];
                let fee_per_byte = tx.fee as f64 / TRANSACTION_WIRE_SIZE as f64;
                if best.map(|(_, best_fee)| fee_per_byte > best_fee).unwrap_or(true) {
                    best = Some((i, fee_per_byte));
                }
            }
            let Some((i, _)) = best else { break };
            let hash = queues[i].1[queues[i].2];
            out.push(state.by_hash[&hash].clone());
            queues[i].2 += 1;
        }
        out
    }

    /// Re-validates every pending entry against the current chain state.
    /// Entries already applied on-chain (nonce below the account's current
    /// nonce) are dropped silently; among the rest, the suffix of any
    /// sender's queue that is no longer nonce-contiguous or affordable is
    /// dropped too. Emits `TransactionsReady` exactly once.
    pub fn on_head_changed(&self) {
        let snapshot: Vec<(Address, Vec<(u32, Hash, Option<u64>)>)> = {
            let state = self.state.read().unwrap();
            state
                .by_sender
                .iter()
                .map(|(addr, nonces)| {
                    let entries = nonces
                        .iter()
                        .map(|(&n, h)| (n, *h, state.by_hash.get(h).and_then(|t| t.total_debit())))
                        .collect();
                    (*addr, entries)
                })
                .collect()
        };

        let mut to_remove = Vec::new();
        for (sender, entries) in snapshot {
            let account = self.chain.accounts().get(&sender);
            let mut expected_nonce = account.nonce;
            let mut cumulative: u64 = 0;
            let mut stale = false;
            for (nonce, hash, debit) in entries {
                if nonce < account.nonce {
                    // Already applied on-chain by the new head; drop it
                    // without tripping `stale` so the still-pending suffix
                    // behind it is judged on its own merits.
                    to_remove.push(hash);
                    continue;
                }
                if stale {
                    to_remove.push(hash);
                    continue;
                }
                let valid = nonce == expected_nonce
                    && debit.map(|d| {
                        cumulative = cumulative.saturating_add(d);
                        cumulative <= account.balance
                    }).unwrap_or(false);
                if valid {
                    expected_nonce += 1;
                } else {
                    to_remove.push(hash);
                    stale = true;
                }
            }
        }

        if !to_remove.is_empty() {
            log::debug!("dropping {} stale transactions after head change", to_remove.len());
        }
        {
            let mut state = self.state.write().unwrap();
            for hash in &to_remove {
                state.remove(hash);
            }
        }

        let _ = self.events.send(Event::TransactionsReady);
    }
}
