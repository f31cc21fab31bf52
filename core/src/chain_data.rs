//! Persistent `blockHash -> ChainData` map the blockchain consults for fork
//! choice, plus the `head` pointer. Grounded on the reference chain's
//! `ChainStore`/`ChainInfo` split: block contents are kept alongside the
//! cumulative proof-of-work ("total work") and main-chain bookkeeping needed
//! to compare branches without re-walking them from genesis every time.

use crate::block::Block;
use crate::store::{key, KvStore, KvTransaction};
use crate::Hash;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything the blockchain needs about one stored block beyond its own
/// header: the cumulative difficulty up to and including it, whether it
/// currently sits on the main chain, and (if so) which block extends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainData {
    pub block: Block,
    /// Sum of `difficulty(n_bits)` from genesis through this block.
    pub total_work: u128,
    pub on_main_chain: bool,
    pub main_chain_successor: Option<Hash>,
}

impl ChainData {
    pub fn height(&self) -> u32 {
        self.block.header.height
    }
}

/// Thin wrapper over a [`KvStore`] for reading/writing [`ChainData`] and the
/// chain head pointer.
pub struct ChainDataStore<S: KvStore> {
    store: Arc<S>,
}

impl<S: KvStore> ChainDataStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn get(&self, block_hash: &Hash) -> Option<ChainData> {
        self.store
            .get(&key::chain_data(&hex::encode(block_hash)))
            .map(|bytes| bincode::deserialize(&bytes).expect("stored chain data is well-formed"))
    }

    pub fn put(&self, block_hash: &Hash, data: &ChainData) {
        let bytes = bincode::serialize(data).expect("chain data is serializable");
        self.store.put(&key::chain_data(&hex::encode(block_hash)), &bytes);
    }

    /// Like [`Self::put`], but writes into an already-open KV transaction
    /// instead of the raw store, so the write commits atomically alongside
    /// others (e.g. the accounts tree commit for the same block).
    pub fn stage_put(&self, kv_tx: &mut S::Tx, block_hash: &Hash, data: &ChainData) {
        let bytes = bincode::serialize(data).expect("chain data is serializable");
        kv_tx.put(&key::chain_data(&hex::encode(block_hash)), &bytes);
    }

    pub fn head_hash(&self) -> Option<Hash> {
        self.store.get(&key::head()).map(|bytes| {
            let mut h = [0u8; 32];
            h.copy_from_slice(&bytes);
            h
        })
    }

    pub fn set_head(&self, block_hash: &Hash) {
        self.store.put(&key::head(), block_hash);
    }

    /// Like [`Self::set_head`], but writes into an already-open KV
    /// transaction instead of the raw store.
    pub fn stage_set_head(&self, kv_tx: &mut S::Tx, block_hash: &Hash) {
        kv_tx.put(&key::head(), block_hash);
    }

    pub fn head(&self) -> Option<ChainData> {
        self.head_hash().and_then(|h| self.get(&h))
    }
}
