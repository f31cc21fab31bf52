//! Cooperative proof-of-work miner: candidate assembly against the current
//! chain head and mempool, then a yielding nonce search that restarts or
//! aborts as soon as either changes under it. Grounded on the reference
//! miner's single mutable-template nonce loop, adapted to `tokio` cooperative
//! yielding and this crate's typed [`Event`] bus instead of a raw stop flag.

use crate::block::{Block, BlockBody, BlockHeader, BlockInterlink};
use crate::blockchain::FullChain;
use crate::config::Policy;
use crate::crypto;
use crate::error::Result;
use crate::events::{Event, EventReceiver, EventSender};
use crate::mempool::Mempool;
use crate::store::KvStore;
use crate::Hash;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinerState {
    Idle,
    Working,
}

/// One assembled-but-unmined block header plus the body it was built from,
/// along with the chain head it was assembled on top of.
struct Candidate {
    header: BlockHeader,
    interlink: BlockInterlink,
    body: BlockBody,
    prev_hash: Hash,
}

/// Rolling hashrate estimate over up to ten one-second windows.
struct HashrateEstimator {
    window_start: Instant,
    attempts_this_window: u64,
    samples: std::collections::VecDeque<f64>,
}

impl HashrateEstimator {
    const MAX_SAMPLES: usize = 10;

    fn new() -> Self {
        Self { window_start: Instant::now(), attempts_this_window: 0, samples: std::collections::VecDeque::new() }
    }

    fn record_attempt(&mut self) -> Option<f64> {
        self.attempts_this_window += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let hashes_per_sec = self.attempts_this_window as f64 / elapsed.as_secs_f64();
        if self.samples.len() >= Self::MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(hashes_per_sec);
        self.attempts_this_window = 0;
        self.window_start = Instant::now();
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }
}

pub struct Miner<S: KvStore> {
    chain: Arc<FullChain<S>>,
    mempool: Arc<Mempool<S>>,
    policy: Policy,
    events: EventSender,
    miner_address: crate::address::Address,
    working: AtomicBool,
}

impl<S: KvStore> Miner<S> {
    pub fn new(
        chain: Arc<FullChain<S>>,
        mempool: Arc<Mempool<S>>,
        policy: Policy,
        events: EventSender,
        miner_address: crate::address::Address,
    ) -> Self {
        Self { chain, mempool, policy, events, miner_address, working: AtomicBool::new(false) }
    }

    pub fn state(&self) -> MinerState {
        if self.working.load(Ordering::Acquire) {
            MinerState::Working
        } else {
            MinerState::Idle
        }
    }

    pub fn stop(&self) {
        self.working.store(false, Ordering::Release);
    }

    /// Builds a candidate header against the current chain head and mempool
    /// contents. Reads `accountsHash` via a commit-then-abort accounts
    /// transaction, so nothing is ever persisted by assembly alone.
    fn assemble_candidate(&self, now: u32) -> Result<Candidate> {
        let head = self.chain.head();
        let prev_hash = self.chain.head_hash();
        let next_n_bits = self.chain.get_next_target(&prev_hash)?;
        let interlink = BlockInterlink::build_next(prev_hash, head.block.header.n_bits);

        let transactions = self.mempool.get_transactions(self.policy.max_block_transactions);
        let body = BlockBody { miner_address: self.miner_address, transactions };

        let mut txn = self.chain.accounts().begin_transaction()?;
        let accounts_hash = txn.commit_block_body(&body, head.height() + 1, &self.policy)?;
        txn.abort();

        let mut rng = rand::thread_rng();
        let header = BlockHeader {
            prev_hash,
            interlink_hash: interlink.hash(),
            body_hash: body.hash(),
            accounts_hash,
            n_bits: next_n_bits,
            height: head.height() + 1,
            timestamp: now.max(head.block.header.timestamp.saturating_add(1)),
            nonce: rng.gen(),
        };
        Ok(Candidate { header, interlink, body, prev_hash })
    }

    /// Runs the search loop until a block is found, the chain head moves out
    /// from under the candidate, the mempool changes, or [`Self::stop`] is
    /// called. Returns once it yields control back to the caller with no
    /// mined block, so callers re-enter in a loop (the "restart assembly"
    /// preemption case).
    async fn search(&self, mut candidate: Candidate, mut events: EventReceiver) -> Option<Block> {
        let mut estimator = HashrateEstimator::new();
        let mut attempts_since_yield: u64 = 0;

        loop {
            while let Ok(event) = events.try_recv() {
                match event {
                    Event::TransactionsReady | Event::TransactionAdded { .. } => return None,
                    Event::HeadChanged { .. } => {
                        if self.chain.head_hash() != candidate.prev_hash {
                            return None;
                        }
                    }
                    _ => {}
                }
            }
            if !self.working.load(Ordering::Acquire) {
                return None;
            }
            if self.chain.head_hash() != candidate.prev_hash {
                return None;
            }

            if candidate.header.verify_proof_of_work() {
                let block =
                    Block { header: candidate.header, interlink: candidate.interlink, body: Some(candidate.body) };
                log::info!("mined block at height {} ({})", block.header.height, hex::encode(block.hash()));
                let _ = self.events.send(Event::BlockMined { block: Box::new(block.clone()) });
                return Some(block);
            }

            candidate.header.nonce = candidate.header.nonce.wrapping_add(1);
            attempts_since_yield += 1;
            if let Some(hashes_per_sec) = estimator.record_attempt() {
                let _ = self.events.send(Event::HashrateChanged { hashes_per_sec });
            }
            if attempts_since_yield >= self.policy.mine_yield_batch {
                attempts_since_yield = 0;
                tokio::task::yield_now().await;
            }
        }
    }

    /// Repeatedly assembles and searches until a block is mined or the miner
    /// is stopped, pushing any mined block back into the chain.
    pub async fn run(&self, now: impl Fn() -> u32) {
        self.working.store(true, Ordering::Release);
        while self.working.load(Ordering::Acquire) {
            let candidate = match self.assemble_candidate(now()) {
                Ok(candidate) => candidate,
                Err(_) => {
                    tokio::task::yield_now().await;
                    continue;
                }
            };
            let events = self.events.subscribe();
            if let Some(block) = self.search(candidate, events).await {
                if self.chain.push_block(block, now()).is_ok() {
                    // Candidate assembly naturally restarts on the next
                    // iteration against the new head.
                }
            }
        }
    }

    /// Assembles a single candidate against the current head and mines it to
    /// completion, without touching [`Self::working`] or looping on
    /// preemption. Intended for callers driving the miner one block at a
    /// time (e.g. a CLI demo) rather than running [`Self::run`]'s continuous
    /// loop.
    pub async fn mine_one(&self, now: u32) -> Result<Block> {
        self.working.store(true, Ordering::Release);
        loop {
            let candidate = self.assemble_candidate(now)?;
            let events = self.events.subscribe();
            if let Some(block) = self.search(candidate, events).await {
                return Ok(block);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::config::Config;
    use crate::store::MemoryStore;

    fn make_genesis(config: &Config, miner: Address) -> Block {
        let body = BlockBody { miner_address: miner, transactions: vec![] };
        let accounts_hash = {
            let accounts = crate::accounts::Accounts::new(Arc::new(MemoryStore::new()));
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

    fn easy_config() -> Config {
        let mut config = Config::default();
        config.genesis_n_bits = 0x2000_ffff;
        config.policy.mine_yield_batch = 64;
        config
    }

    #[tokio::test]
    async fn miner_finds_a_block_extending_genesis() {
        let config = easy_config();
        let store = Arc::new(MemoryStore::new());
        let miner_address = Address([5u8; 20]);
        let genesis = make_genesis(&config, miner_address);
        let (events_tx, _rx) = crate::events::channel();
        let chain = Arc::new(FullChain::new(store, config.clone(), genesis.clone(), events_tx.clone()).unwrap());
        let mempool = Arc::new(Mempool::new(Arc::clone(&chain), config.policy.clone(), events_tx.clone()));

        let miner = Miner::new(Arc::clone(&chain), mempool, config.policy.clone(), events_tx, miner_address);

        let candidate = miner.assemble_candidate(1_000_000).unwrap();
        assert_eq!(candidate.prev_hash, genesis.hash());

        let events = miner.events.subscribe();
        miner.working.store(true, Ordering::Release);
        let mined = miner.search(candidate, events).await;
        assert!(mined.is_some());

        let block = mined.unwrap();
        assert_eq!(block.header.prev_hash, genesis.hash());
        assert!(block.header.verify_proof_of_work());
    }

    #[tokio::test]
    async fn search_aborts_when_head_moves_away_from_candidate() {
        let config = easy_config();
        let store = Arc::new(MemoryStore::new());
        let miner_address = Address([6u8; 20]);
        let genesis = make_genesis(&config, miner_address);
        let (events_tx, _rx) = crate::events::channel();
        let chain = Arc::new(FullChain::new(store, config.clone(), genesis.clone(), events_tx.clone()).unwrap());
        let mempool = Arc::new(Mempool::new(Arc::clone(&chain), config.policy.clone(), events_tx.clone()));
        let miner = Miner::new(Arc::clone(&chain), mempool, config.policy.clone(), events_tx, miner_address);

        let mut candidate = miner.assemble_candidate(1_000_000).unwrap();
        // Make this candidate impossible to satisfy so the loop keeps
        // spinning long enough for us to move the head out from under it.
        candidate.header.n_bits = 0x0100_0000;
        candidate.prev_hash = [0xAB; 32];

        miner.working.store(true, Ordering::Release);
        let events = miner.events.subscribe();
        let mined = miner.search(candidate, events).await;
        assert!(mined.is_none());
    }
}
