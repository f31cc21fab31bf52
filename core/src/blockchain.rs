//! `FullChain`: validation, fork choice, rebranching and the head pointer.
//! Composes [`Accounts`] and [`ChainDataStore`] the way the reference chain's
//! `Blockchain` composes `Accounts`/`ChainStore` — a single serializing lock
//! around `push_block`, and a common-ancestor walk for reorgs.

use crate::accounts::Accounts;
use crate::address::Address;
use crate::block::{compact_to_target, difficulty, hash_meets_target, target_to_compact, Block};
use crate::chain_data::{ChainData, ChainDataStore};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{Event, EventSender};
use crate::store::{KvStore, KvTransaction};
use crate::Hash;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};

/// Maximum allowed drift between a block's timestamp and the validator's
/// wall clock, in seconds.
pub const MAX_TIMESTAMP_DRIFT_SECS: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    /// Stored as a side branch; did not become (or stay) the main-chain head.
    Accepted,
    /// Stored as a side branch that is now the heaviest chain; head moved via rebranch.
    Forked,
    /// Extended the current main-chain head directly.
    Extended,
    /// Predecessor unknown; buffered in the orphan pool.
    Orphan,
    /// Already present in the chain data store.
    Known,
}

struct Orphans {
    order: VecDeque<Hash>,
    by_hash: std::collections::HashMap<Hash, Block>,
    capacity: usize,
}

impl Orphans {
    fn new(capacity: usize) -> Self {
        Self { order: VecDeque::new(), by_hash: std::collections::HashMap::new(), capacity }
    }

    fn push(&mut self, block: Block) {
        let hash = block.hash();
        if self.by_hash.contains_key(&hash) {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.by_hash.remove(&oldest);
            }
        }
        self.order.push_back(hash);
        self.by_hash.insert(hash, block);
    }

    /// Removes and returns every orphan whose `prev_hash` is `parent`.
    fn take_children_of(&mut self, parent: &Hash) -> Vec<Block> {
        let matching: Vec<Hash> =
            self.by_hash.iter().filter(|(_, b)| &b.header.prev_hash == parent).map(|(h, _)| *h).collect();
        let mut blocks = Vec::with_capacity(matching.len());
        for hash in matching {
            self.order.retain(|h| h != &hash);
            if let Some(block) = self.by_hash.remove(&hash) {
                blocks.push(block);
            }
        }
        blocks
    }
}

pub struct FullChain<S: KvStore> {
    store: Arc<S>,
    chain_data: ChainDataStore<S>,
    accounts: Accounts<S>,
    config: Config,
    events: EventSender,
    push_lock: Mutex<()>,
    head: RwLock<Hash>,
    orphans: Mutex<Orphans>,
}

impl<S: KvStore> FullChain<S> {
    /// Opens an existing chain from `store`, or initializes one from
    /// `genesis` if the store is empty.
    pub fn new(store: Arc<S>, config: Config, genesis: Block, events: EventSender) -> Result<Self> {
        let chain_data = ChainDataStore::new(Arc::clone(&store));
        let accounts = Accounts::new(Arc::clone(&store));

        let orphan_capacity = config.policy.orphan_pool_capacity;

        if let Some(head_hash) = chain_data.head_hash() {
            return Ok(Self {
                store,
                chain_data,
                accounts,
                config,
                events,
                push_lock: Mutex::new(()),
                head: RwLock::new(head_hash),
                orphans: Mutex::new(Orphans::new(orphan_capacity)),
            });
        }

        let genesis_hash = genesis.hash();
        let body = genesis.body.clone().ok_or_else(|| Error::InvalidBlock("genesis has no body".into()))?;
        let mut txn = accounts.begin_transaction()?;
        let accounts_hash = txn.commit_block_body(&body, genesis.header.height, &config.policy)?;
        if accounts_hash != genesis.header.accounts_hash {
            txn.abort();
            return Err(Error::InvalidBlock("genesis accountsHash mismatch".into()));
        }

        let data = ChainData {
            block: genesis.clone(),
            total_work: difficulty(&compact_to_target(genesis.header.n_bits)),
            on_main_chain: true,
            main_chain_successor: None,
        };

        let mut kv_tx = store.begin_tx();
        txn.stage(&mut kv_tx);
        chain_data.stage_put(&mut kv_tx, &genesis_hash, &data);
        chain_data.stage_set_head(&mut kv_tx, &genesis_hash);
        kv_tx.commit();

        Ok(Self {
            store,
            chain_data,
            accounts,
            config,
            events,
            push_lock: Mutex::new(()),
            head: RwLock::new(genesis_hash),
            orphans: Mutex::new(Orphans::new(orphan_capacity)),
        })
    }

    pub fn head_hash(&self) -> Hash {
        *self.head.read().unwrap()
    }

    pub fn head(&self) -> ChainData {
        self.chain_data.get(&self.head_hash()).expect("head always resolves to stored chain data")
    }

    pub fn height(&self) -> u32 {
        self.head().height()
    }

    pub fn get_block(&self, hash: &Hash) -> Option<Block> {
        self.chain_data.get(hash).map(|d| d.block)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.chain_data.get(hash).is_some()
    }

    pub fn accounts(&self) -> &Accounts<S> {
        &self.accounts
    }

    pub fn balance(&self, addr: &Address) -> u64 {
        self.accounts.get(addr).balance
    }

    /// Entry point for inserting a new block. `push_one` does the actual
    /// locked insert; this wrapper then drains any orphans that `block`'s
    /// acceptance resurrects, one `push_one` call at a time via a work
    /// queue, so the lock is never held recursively.
    pub fn push_block(&self, block: Block, now: u32) -> Result<PushResult> {
        let hash = block.hash();
        let result = self.push_one(block, now)?;

        let mut frontier = VecDeque::new();
        frontier.push_back(hash);
        while let Some(parent_hash) = frontier.pop_front() {
            let resurrected = self.orphans.lock().unwrap().take_children_of(&parent_hash);
            for orphan in resurrected {
                let orphan_hash = orphan.hash();
                if self.push_one(orphan, now).is_ok() {
                    frontier.push_back(orphan_hash);
                }
            }
        }

        Ok(result)
    }

    /// Single serializing insert of exactly one block, under `push_lock`.
    fn push_one(&self, block: Block, now: u32) -> Result<PushResult> {
        let _guard = self.push_lock.lock().unwrap();

        let hash = block.hash();
        if self.chain_data.get(&hash).is_some() {
            return Ok(PushResult::Known);
        }

        self.validate_stateless(&block, now)?;

        let Some(parent) = self.chain_data.get(&block.header.prev_hash) else {
            log::debug!("buffering orphan {} awaiting parent {}", hex::encode(hash), hex::encode(block.header.prev_hash));
            self.orphans.lock().unwrap().push(block);
            return Ok(PushResult::Orphan);
        };

        self.insert_validated(hash, block, parent)
    }

    fn validate_stateless(&self, block: &Block, now: u32) -> Result<()> {
        let header = &block.header;
        if header.interlink_hash != block.interlink.hash() {
            return Err(Error::InvalidBlock("interlink hash mismatch".into()));
        }
        let body = block.body.as_ref().ok_or_else(|| Error::InvalidBlock("block body required".into()))?;
        if header.body_hash != body.hash() {
            return Err(Error::InvalidBlock("body hash mismatch".into()));
        }
        if header.timestamp > now.saturating_add(MAX_TIMESTAMP_DRIFT_SECS) {
            return Err(Error::InvalidBlock("timestamp too far in the future".into()));
        }
        if !header.verify_proof_of_work() {
            return Err(Error::InvalidBlock("proof of work does not meet target".into()));
        }
        Ok(())
    }

    fn insert_validated(&self, hash: Hash, block: Block, parent: ChainData) -> Result<PushResult> {
        if block.header.height != parent.height() + 1 {
            return Err(Error::InvalidBlock("non-sequential height".into()));
        }
        if block.header.timestamp < parent.block.header.timestamp.saturating_add(1) {
            return Err(Error::InvalidBlock("timestamp does not advance on parent".into()));
        }
        let expected_n_bits = self.get_next_target(&block.header.prev_hash)?;
        if block.header.n_bits != expected_n_bits {
            return Err(Error::InvalidBlock("nBits does not match retarget".into()));
        }

        let total_work = parent.total_work + difficulty(&compact_to_target(block.header.n_bits));
        let head_work = self.head().total_work;

        if block.header.prev_hash == self.head_hash() {
            self.extend(hash, block, total_work)
        } else if total_work > head_work {
            self.rebranch(hash, block, total_work)
        } else {
            let data = ChainData { block, total_work, on_main_chain: false, main_chain_successor: None };
            self.chain_data.put(&hash, &data);
            let _ = self.events.send(Event::BlockAdded { hash });
            Ok(PushResult::Accepted)
        }
    }

    fn extend(&self, hash: Hash, block: Block, total_work: u128) -> Result<PushResult> {
        let prev_hash = block.header.prev_hash;
        let mut parent = self.chain_data.get(&prev_hash).expect("parent already looked up");
        let body = block.body.clone().expect("validated body presence");

        let mut txn = self.accounts.begin_transaction()?;
        let accounts_hash = txn.commit_block_body(&body, block.header.height, &self.config.policy)?;
        if accounts_hash != block.header.accounts_hash {
            txn.abort();
            return Err(Error::InvalidBlock("accountsHash mismatch".into()));
        }

        parent.main_chain_successor = Some(hash);
        let data = ChainData { block, total_work, on_main_chain: true, main_chain_successor: None };
        let height = data.height();

        // Bundle the accounts commit, chain-data writes, and head pointer
        // into one KV transaction so a failure partway through never leaves
        // the accounts tree and chain data ranges inconsistent.
        let mut kv_tx = self.store.begin_tx();
        txn.stage(&mut kv_tx);
        self.chain_data.stage_put(&mut kv_tx, &prev_hash, &parent);
        self.chain_data.stage_put(&mut kv_tx, &hash, &data);
        self.chain_data.stage_set_head(&mut kv_tx, &hash);
        kv_tx.commit();
        *self.head.write().unwrap() = hash;

        log::info!("extended chain to height {} ({})", height, hex::encode(hash));
        let _ = self.events.send(Event::BlockAdded { hash });
        let _ = self.events.send(Event::head_changed(hash, 0));
        Ok(PushResult::Extended)
    }

    /// Reorganizes the main chain onto the branch ending at `hash`. All
    /// mutations across the revert-then-commit walk run inside a single
    /// accounts transaction so a mid-way failure leaves the prior main chain
    /// untouched.
    fn rebranch(&self, hash: Hash, new_head_block: Block, new_head_work: u128) -> Result<PushResult> {
        let old_head_hash = self.head_hash();

        let mut fork_chain: Vec<(Hash, ChainData)> = Vec::new();
        let mut cursor_hash = hash;
        let mut cursor = ChainData {
            block: new_head_block,
            total_work: new_head_work,
            on_main_chain: false,
            main_chain_successor: None,
        };
        while !cursor.on_main_chain {
            fork_chain.push((cursor_hash, cursor.clone()));
            cursor_hash = cursor.block.header.prev_hash;
            cursor = self
                .chain_data
                .get(&cursor_hash)
                .ok_or_else(|| Error::StorageFailure("fork predecessor missing while rebranching".into()))?;
        }
        let ancestor_hash = cursor_hash;
        let ancestor = cursor;

        let mut revert_chain: Vec<(Hash, ChainData)> = Vec::new();
        let mut main_hash = old_head_hash;
        let mut main_data =
            self.chain_data.get(&main_hash).ok_or_else(|| Error::StorageFailure("missing head chain data".into()))?;

        let mut txn = self.accounts.begin_transaction()?;
        while main_hash != ancestor_hash {
            let body = main_data
                .block
                .body
                .clone()
                .ok_or_else(|| Error::StorageFailure("main chain block missing body on revert".into()))?;
            txn.revert_block_body(&body, main_data.height(), &self.config.policy)?;
            revert_chain.push((main_hash, main_data.clone()));
            let prev_hash = main_data.block.header.prev_hash;
            main_data = self
                .chain_data
                .get(&prev_hash)
                .ok_or_else(|| Error::StorageFailure("main chain predecessor missing while rebranching".into()))?;
            main_hash = prev_hash;
        }

        for (fork_hash, fork_data) in fork_chain.iter().rev() {
            let body = fork_data
                .block
                .body
                .clone()
                .ok_or_else(|| Error::InvalidBlock("fork block missing body".into()))?;
            let accounts_hash = txn.commit_block_body(&body, fork_data.height(), &self.config.policy)?;
            if accounts_hash != fork_data.block.header.accounts_hash {
                txn.abort();
                return Err(Error::InvalidBlock(format!("fork block {fork_hash:?} accountsHash mismatch")));
            }
        }

        let reverted_count = revert_chain.len();

        // Bundle the accounts commit and every chain-data/head write from
        // the revert-then-apply walk into one KV transaction, so a failure
        // partway through never leaves the prior main chain half-rewritten.
        let mut kv_tx = self.store.begin_tx();
        txn.stage(&mut kv_tx);

        for (reverted_hash, mut reverted_data) in revert_chain {
            reverted_data.on_main_chain = false;
            reverted_data.main_chain_successor = None;
            self.chain_data.stage_put(&mut kv_tx, &reverted_hash, &reverted_data);
        }

        let mut ancestor = ancestor;
        ancestor.main_chain_successor = fork_chain.last().map(|(h, _)| *h);
        self.chain_data.stage_put(&mut kv_tx, &ancestor_hash, &ancestor);

        for i in (0..fork_chain.len()).rev() {
            let (fork_hash, mut fork_data) = fork_chain[i].clone();
            fork_data.on_main_chain = true;
            fork_data.main_chain_successor = if i > 0 { Some(fork_chain[i - 1].0) } else { None };
            self.chain_data.stage_put(&mut kv_tx, &fork_hash, &fork_data);
        }

        self.chain_data.stage_set_head(&mut kv_tx, &hash);
        kv_tx.commit();
        *self.head.write().unwrap() = hash;

        log::info!(
            "rebranched to {} ({} blocks reverted, {} applied)",
            hex::encode(hash),
            reverted_count,
            fork_chain.len()
        );
        let _ = self.events.send(Event::BlockAdded { hash });
        let _ = self.events.send(Event::head_changed(hash, reverted_count as u32));
        Ok(PushResult::Forked)
    }

    /// Difficulty retargeting: looks back `policy.difficulty_block_window`
    /// blocks along `parent`'s main chain and adjusts the previous target by
    /// the ratio of actual to expected elapsed time, clamped to
    /// `policy.difficulty_max_adjustment`. Exact retarget-curve shape beyond
    /// this bound is a network-tuning concern out of scope here.
    pub fn get_next_target(&self, parent_hash: &Hash) -> Result<u32> {
        let parent = self
            .chain_data
            .get(parent_hash)
            .ok_or_else(|| Error::StorageFailure("unknown parent for target computation".into()))?;
        let policy = &self.config.policy;
        let window = policy.difficulty_block_window;

        if parent.height() + 1 <= window {
            return Ok(self.config.genesis_n_bits);
        }

        let mut tail = parent.clone();
        for _ in 0..window {
            tail = self
                .chain_data
                .get(&tail.block.header.prev_hash)
                .ok_or_else(|| Error::StorageFailure("missing retarget window ancestor".into()))?;
        }

        let delta_work = parent.total_work.saturating_sub(tail.total_work).max(1);
        let actual_time = parent.block.header.timestamp.saturating_sub(tail.block.header.timestamp).max(1) as f64;
        let expected_time = (window as u64 * policy.block_time_secs as u64) as f64;
        let mut adjustment = actual_time / expected_time;
        adjustment = adjustment.clamp(1.0 / policy.difficulty_max_adjustment, policy.difficulty_max_adjustment);

        let max_target = compact_to_target(self.config.genesis_n_bits);
        let max_target_val = u128::from_be_bytes(max_target[0..16].try_into().unwrap()).max(1) as f64;
        let avg_difficulty = (delta_work as f64 / window as f64).max(1.0);
        let avg_target_val = max_target_val / avg_difficulty;
        let next_target_val = (avg_target_val * adjustment).clamp(1.0, max_target_val);

        let mut next_target = [0u8; 32];
        next_target[0..16].copy_from_slice(&(next_target_val as u128).to_be_bytes());
        Ok(target_to_compact(&next_target))
    }

    /// True iff `hash` (a candidate header hash) would satisfy the target
    /// implied by `n_bits`. Exposed for the miner's search loop.
    pub fn meets_target(hash: &Hash, n_bits: u32) -> bool {
        hash_meets_target(hash, &compact_to_target(n_bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockBody, BlockHeader, BlockInterlink};
    use crate::config::Config;
    use crate::store::MemoryStore;
    use crate::transaction::Transaction;
    use ed25519_dalek::{Keypair, SecretKey, Signer};

    fn keypair(seed: u8) -> Keypair {
        let secret = SecretKey::from_bytes(&[seed; 32]).unwrap();
        let public = ed25519_dalek::PublicKey::from(&secret);
        Keypair { secret, public }
    }

    fn make_genesis(config: &Config, miner: Address) -> Block {
        let body = BlockBody { miner_address: miner, transactions: vec![] };
        let accounts_hash = {
            // Pre-compute the accounts hash an empty tree plus coinbase would produce.
            let store = Arc::new(MemoryStore::new());
            let accounts = Accounts::new(store);
            let mut txn = accounts.begin_transaction().unwrap();
            let hash = txn.commit_block_body(&body, 0, &config.policy).unwrap();
            txn.abort();
            hash
        };
        let interlink = BlockInterlink::default();
        let header = BlockHeader {
            prev_hash: [0u8; 32],
            interlink_hash: interlink.hash(),
            body_hash: body.hash(),
            accounts_hash,
            n_bits: config.genesis_n_bits,
            height: 0,
            timestamp: 0,
            nonce: 0,
        };
        Block { header, interlink, body: Some(body) }
    }

    fn mine(mut block: Block) -> Block {
        loop {
            if block.header.verify_proof_of_work() {
                return block;
            }
            block.header.nonce = block.header.nonce.wrapping_add(1);
        }
    }

    fn child_block(chain: &FullChain<MemoryStore>, config: &Config, parent_hash: Hash, miner: Address, txs: Vec<Transaction>) -> Block {
        let parent = chain.chain_data.get(&parent_hash).unwrap();
        let body = BlockBody { miner_address: miner, transactions: txs };
        let interlink = BlockInterlink::build_next(parent_hash, parent.block.header.n_bits);

        let mut txn = chain.accounts.begin_transaction().unwrap();
        let accounts_hash = txn.commit_block_body(&body, parent.height() + 1, &config.policy).unwrap();
        txn.abort();

        let n_bits = chain.get_next_target(&parent_hash).unwrap();
        let header = BlockHeader {
            prev_hash: parent_hash,
            interlink_hash: interlink.hash(),
            body_hash: body.hash(),
            accounts_hash,
            n_bits,
            height: parent.height() + 1,
            timestamp: parent.block.header.timestamp + 1,
            nonce: 0,
        };
        mine(Block { header, interlink, body: Some(body) })
    }

    fn easy_config() -> Config {
        let mut config = Config::default();
        config.genesis_n_bits = 0x2000_ffff;
        config.policy.difficulty_block_window = 2;
        config
    }

    #[test]
    fn genesis_then_linear_extension() {
        let config = easy_config();
        let store = Arc::new(MemoryStore::new());
        let miner = Address([1u8; 20]);
        let genesis = make_genesis(&config, miner);
        let (tx, _rx) = crate::events::channel();
        let chain = FullChain::new(store, config.clone(), genesis.clone(), tx).unwrap();

        assert_eq!(chain.head_hash(), genesis.hash());
        assert_eq!(chain.height(), 0);

        let b1 = child_block(&chain, &config, genesis.hash(), miner, vec![]);
        let result = chain.push_block(b1.clone(), b1.header.timestamp + 100).unwrap();
        assert_eq!(result, PushResult::Extended);
        assert_eq!(chain.head_hash(), b1.hash());
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn known_block_is_reported_known() {
        let config = easy_config();
        let store = Arc::new(MemoryStore::new());
        let miner = Address([1u8; 20]);
        let genesis = make_genesis(&config, miner);
        let (tx, _rx) = crate::events::channel();
        let chain = FullChain::new(store, config.clone(), genesis.clone(), tx).unwrap();

        let b1 = child_block(&chain, &config, genesis.hash(), miner, vec![]);
        chain.push_block(b1.clone(), 1_000_000).unwrap();
        let again = chain.push_block(b1, 1_000_000).unwrap();
        assert_eq!(again, PushResult::Known);
    }

    #[test]
    fn unknown_parent_is_buffered_as_orphan() {
        let config = easy_config();
        let store = Arc::new(MemoryStore::new());
        let miner = Address([1u8; 20]);
        let genesis = make_genesis(&config, miner);
        let (tx, _rx) = crate::events::channel();
        let chain = FullChain::new(store, config.clone(), genesis.clone(), tx).unwrap();

        let mut orphan = child_block(&chain, &config, genesis.hash(), miner, vec![]);
        orphan.header.prev_hash = [0xAB; 32];
        let result = chain.push_block(orphan, 1_000_000).unwrap();
        assert_eq!(result, PushResult::Orphan);
    }

    #[test]
    fn orphan_resurrection_does_not_deadlock_and_advances_head() {
        let config = easy_config();
        let store = Arc::new(MemoryStore::new());
        let miner = Address([1u8; 20]);
        let genesis = make_genesis(&config, miner);
        let (tx, _rx) = crate::events::channel();
        let chain = FullChain::new(store, config.clone(), genesis.clone(), tx).unwrap();

        let b1 = child_block(&chain, &config, genesis.hash(), miner, vec![]);
        let b2 = child_block(&chain, &config, b1.hash(), miner, vec![]);

        // Push the child before its parent is known, so it is buffered as an
        // orphan; pushing the parent afterward must resurrect and apply it
        // without the push lock deadlocking.
        let result = chain.push_block(b2.clone(), 1_000_000).unwrap();
        assert_eq!(result, PushResult::Orphan);

        let result = chain.push_block(b1.clone(), 1_000_000).unwrap();
        assert_eq!(result, PushResult::Extended);

        assert_eq!(chain.head_hash(), b2.hash());
        assert_eq!(chain.height(), 2);
    }

    #[test]
    fn fork_block_with_less_work_is_accepted_without_moving_head() {
        let config = easy_config();
        let store = Arc::new(MemoryStore::new());
        let miner = Address([1u8; 20]);
        let genesis = make_genesis(&config, miner);
        let (tx, _rx) = crate::events::channel();
        let chain = FullChain::new(store, config.clone(), genesis.clone(), tx).unwrap();

        let b1 = child_block(&chain, &config, genesis.hash(), miner, vec![]);
        chain.push_block(b1.clone(), 1_000_000).unwrap();

        let b2 = child_block(&chain, &config, b1.hash(), miner, vec![]);
        chain.push_block(b2.clone(), 1_000_000).unwrap();

        // A sibling of b1 off genesis has equal, not greater, total work than the
        // current (two-block) head, so it should not trigger a rebranch.
        let mut sibling = child_block(&chain, &config, genesis.hash(), miner, vec![]);
        sibling.header.nonce = sibling.header.nonce.wrapping_add(1);
        let result = chain.push_block(sibling, 1_000_000).unwrap();
        assert!(matches!(result, PushResult::Accepted | PushResult::Known));
        assert_eq!(chain.head_hash(), b2.hash());
    }

    #[test]
    fn transfer_in_a_pushed_block_updates_balances() {
        let config = easy_config();
        let store = Arc::new(MemoryStore::new());
        let kp = keypair(50);
        let sender = crate::crypto::pubkey_to_address(&kp.public.to_bytes());
        let genesis = make_genesis(&config, sender);
        let (tx, _rx) = crate::events::channel();
        let chain = FullChain::new(store, config.clone(), genesis.clone(), tx).unwrap();
        let h0 = chain.accounts.hash();

        let recipient = Address([9u8; 20]);
        let mut transfer = Transaction {
            sender_public_key: kp.public.to_bytes(),
            recipient,
            value: 10,
            fee: 1,
            nonce: 0,
            signature: [0u8; 64],
        };
        let sig = kp.sign(&transfer.signing_message());
        transfer.signature = sig.to_bytes();

        let b1 = child_block(&chain, &config, genesis.hash(), sender, vec![transfer]);
        chain.push_block(b1, 1_000_000).unwrap();
        assert_ne!(chain.accounts.hash(), h0);
        assert_eq!(chain.balance(&recipient), 10);
    }
}
