//! Consensus and runtime configuration for **Obscura** core.
//!
//! [`Policy`] centralises the per-network tuning constants the blockchain
//! spec leaves open ("policy constants to be fixed per-network"): the
//! difficulty retarget window and bounds, target block time, minimum relay
//! fee, orphan-pool capacity, and the block-reward halving schedule.
//! [`Config`] wraps a `Policy` plus the handful of settings that vary
//! between networks (name, genesis difficulty). Both are built with the
//! fluent-builder pattern already used by the crate's `ConfigBuilder`, so
//! callers customise only the fields they care about.
//!
//! ```
//! use obscura_core::config::Config;
//!
//! let cfg = Config::default();
//! assert_eq!(cfg.network, "main");
//! assert_eq!(cfg.policy.block_reward(0), cfg.policy.initial_block_reward);
//! ```

use serde::{Deserialize, Serialize};

/// Per-network consensus parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    /// Number of blocks (`K`) the difficulty retarget looks back over.
    pub difficulty_block_window: u32,

    /// Maximum factor by which the target may grow or shrink in one
    /// retarget step.
    pub difficulty_max_adjustment: f64,

    /// Target time between blocks, in seconds.
    pub block_time_secs: u32,

    /// Minimum fee (flat, in the smallest currency unit) the mempool will
    /// relay.
    pub min_relay_fee: u64,

    /// Maximum number of blocks buffered in the orphan pool before the
    /// oldest is evicted.
    pub orphan_pool_capacity: usize,

    /// Maximum number of transactions a miner will pack into one candidate
    /// block body.
    pub max_block_transactions: usize,

    /// Block subsidy at height 0, before any halving.
    pub initial_block_reward: u64,

    /// Height interval after which the block subsidy halves.
    pub reward_halving_interval: u32,

    /// Number of proof-of-work attempts the miner performs between
    /// cooperative yields.
    pub mine_yield_batch: u64,
}

impl Policy {
    /// Coinbase subsidy for a block at `height`, per the halving schedule.
    /// Floors to zero once the shift would overflow.
    pub fn block_reward(&self, height: u32) -> u64 {
        let halvings = height / self.reward_halving_interval;
        if halvings >= 64 {
            0
        } else {
            self.initial_block_reward >> halvings
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            difficulty_block_window: 20,
            difficulty_max_adjustment: 4.0,
            block_time_secs: 60,
            min_relay_fee: 1,
            orphan_pool_capacity: 512,
            max_block_transactions: 255,
            initial_block_reward: 50,
            reward_halving_interval: 210_000,
            mine_yield_batch: 256,
        }
    }
}

/// Runtime configuration shared across the crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Human-readable name identifying the network (e.g. "main", "test").
    pub network: String,

    /// Compact-encoded proof-of-work target new chains start from.
    pub genesis_n_bits: u32,

    /// Consensus policy constants for this network.
    pub policy: Policy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: "main".into(),
            genesis_n_bits: 0x1f00_ffff,
            policy: Policy::default(),
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self { inner: Config::default() }
    }

    pub fn network<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.network = name.into();
        self
    }

    pub fn genesis_n_bits(mut self, n_bits: u32) -> Self {
        self.inner.genesis_n_bits = n_bits;
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.inner.policy = policy;
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}
