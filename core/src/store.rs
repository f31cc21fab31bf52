//! The key/value storage contract the accounts tree and chain data store
//! are built on. The real engine (an atomic-transactional KV store) is an
//! external collaborator per the node spec §6; this module defines that
//! contract as a trait plus an in-memory reference implementation used by
//! tests and the CLI demo.
//!
//! Key ranges are partitioned by subsystem, as required by §6:
//! `accountstree/*`, `chaindata/*`, and a standalone `head` key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A key/value store supporting atomic transactional batches.
pub trait KvStore: Send + Sync {
    type Tx: KvTransaction;

    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn put(&self, key: &[u8], value: &[u8]);
    fn delete(&self, key: &[u8]);
    fn begin_tx(&self) -> Self::Tx;
}

/// A buffered batch of writes, applied atomically on [`KvTransaction::commit`]
/// and discarded on [`KvTransaction::abort`]. Reads observe the transaction's
/// own pending writes layered over the committed store.
pub trait KvTransaction {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn put(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
    fn commit(self);
    fn abort(self);
}

enum Op {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// In-memory [`KvStore`] reference implementation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    type Tx = MemoryTx;

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &[u8], value: &[u8]) {
        self.data.lock().unwrap().insert(key.to_vec(), value.to_vec());
    }

    fn delete(&self, key: &[u8]) {
        self.data.lock().unwrap().remove(key);
    }

    fn begin_tx(&self) -> MemoryTx {
        MemoryTx { data: Arc::clone(&self.data), ops: Vec::new() }
    }
}

pub struct MemoryTx {
    data: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
    ops: Vec<Op>,
}

impl KvTransaction for MemoryTx {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        for op in self.ops.iter().rev() {
            match op {
                Op::Put(k, v) if k.as_slice() == key => return Some(v.clone()),
                Op::Delete(k) if k.as_slice() == key => return None,
                _ => {}
            }
        }
        self.data.lock().unwrap().get(key).cloned()
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(Op::Put(key.to_vec(), value.to_vec()));
    }

    fn delete(&mut self, key: &[u8]) {
        self.ops.push(Op::Delete(key.to_vec()));
    }

    fn commit(self) {
        let mut data = self.data.lock().unwrap();
        for op in self.ops {
            match op {
                Op::Put(k, v) => {
                    data.insert(k, v);
                }
                Op::Delete(k) => {
                    data.remove(&k);
                }
            }
        }
    }

    fn abort(self) {}
}

pub mod key {
    pub fn accounts_tree_node(hash_hex: &str) -> Vec<u8> {
        format!("accountstree/node/{hash_hex}").into_bytes()
    }

    pub fn accounts_tree_root() -> Vec<u8> {
        b"accountstree/root".to_vec()
    }

    pub fn chain_data(hash_hex: &str) -> Vec<u8> {
        format!("chaindata/{hash_hex}").into_bytes()
    }

    pub fn head() -> Vec<u8> {
        b"head".to_vec()
    }
}
