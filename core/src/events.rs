//! The node's event bus: a typed replacement for the observer pattern, so
//! every subsystem's outward notifications go through one `broadcast`
//! channel instead of a bag of callback registrations.

use crate::block::Block;
use crate::transaction::Transaction;
use crate::Hash;

#[derive(Debug, Clone)]
pub enum Event {
    /// The main-chain head changed, carrying the new head block hash and
    /// how many blocks were reverted off the old main chain to get there
    /// (zero for a direct extension, nonzero for a reorg).
    HeadChanged { new_head: Hash, rebranch_depth: u32 },
    /// A block was accepted into the chain data store, whether or not it
    /// extended the main chain.
    BlockAdded { hash: Hash },
    /// A transaction was accepted into the mempool.
    TransactionAdded { hash: Hash },
    /// The mempool finished reacting to a head change; its contents are
    /// stable until the next one. Emitted at most once per head change.
    TransactionsReady,
    /// The miner found a block meeting its target.
    BlockMined { block: Box<Block> },
    /// The miner's rolling hashrate estimate changed.
    HashrateChanged { hashes_per_sec: f64 },
}

impl Event {
    pub fn head_changed(new_head: Hash, rebranch_depth: u32) -> Self {
        Event::HeadChanged { new_head, rebranch_depth }
    }

    pub fn transaction_added(tx: &Transaction) -> Self {
        Event::TransactionAdded { hash: tx.hash() }
    }
}

/// Channel capacity for the shared broadcast bus. Generous enough that a
/// slow subscriber lags rather than drops events under normal load; callers
/// that fall behind receive [`tokio::sync::broadcast::error::RecvError::Lagged`].
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

pub type EventSender = tokio::sync::broadcast::Sender<Event>;
pub type EventReceiver = tokio::sync::broadcast::Receiver<Event>;

pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY)
}
