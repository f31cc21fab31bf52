//! The root composition: one-directional ownership of [`FullChain`] down
//! through [`Mempool`] to [`Miner`], sharing a single event bus. Wiring the
//! head-changed-to-mempool-sweep-to-miner-restart causal chain (§5's ordering
//! guarantee) is this module's job; the subsystems themselves stay ignorant
//! of each other.

use crate::address::Address;
use crate::block::Block;
use crate::blockchain::FullChain;
use crate::config::Config;
use crate::events::{self, EventSender};
use crate::error::Result;
use crate::mempool::Mempool;
use crate::miner::Miner;
use crate::store::KvStore;
use std::sync::Arc;

pub struct Node<S: KvStore> {
    pub chain: Arc<FullChain<S>>,
    pub mempool: Arc<Mempool<S>>,
    pub miner: Arc<Miner<S>>,
    events: EventSender,
}

impl<S: KvStore> Node<S> {
    pub fn new(store: Arc<S>, config: Config, genesis: Block, miner_address: Address) -> Result<Self> {
        let (events, _rx) = events::channel();
        let chain = Arc::new(FullChain::new(store, config.clone(), genesis, events.clone())?);
        let mempool = Arc::new(Mempool::new(Arc::clone(&chain), config.policy.clone(), events.clone()));
        let miner =
            Arc::new(Miner::new(Arc::clone(&chain), Arc::clone(&mempool), config.policy, events.clone(), miner_address));
        Ok(Self { chain, mempool, miner, events })
    }

    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    /// Pushes a block through the chain, then reacts if the head moved: the
    /// mempool sweeps and re-emits `transactions-ready` before the miner's
    /// next `HeadChanged` (already sent by [`FullChain`]) would be acted on,
    /// so a restarted candidate never races a stale mempool snapshot.
    pub fn push_block(&self, block: Block, now: u32) -> Result<crate::blockchain::PushResult> {
        let before = self.chain.head_hash();
        let result = self.chain.push_block(block, now)?;
        if self.chain.head_hash() != before {
            self.mempool.on_head_changed();
        }
        Ok(result)
    }

    pub fn push_transaction(&self, tx: crate::transaction::Transaction) -> crate::mempool::PushResult {
        self.mempool.push_transaction(tx)
    }
}
