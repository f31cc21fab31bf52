//! Error types for the **Obscura** core crate.
//!
//! All high-level operations return [`crate::Result`] which is a convenient
//! alias for `core::result::Result<T, Error>`. Categories mirror the error
//! taxonomy in the node's design: validation errors are never retried, while
//! `StorageFailure` is fatal and propagates, aborting any open
//! [`crate::accounts_tree`] transaction on the way out.
//!
//! # Examples
//!
//! ```
//! use obscura_core::{Error, Result};
//!
//! fn demo_fn(fail: bool) -> Result<()> {
//!     if fail {
//!         Err(Error::InvalidTx("insufficient balance".into()))
//!     } else {
//!         Ok(())
//!     }
//! }
//! ```

use thiserror::Error;

/// Core crate error type.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    /// The backing key/value store failed. Fatal: propagate and abort any
    /// open accounts-tree transaction.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// A block failed structural, proof-of-work, chain-linkage, or policy
    /// validation (e.g. a header timestamp too far in the future). Recovery
    /// is the same for both: the block is rejected.
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    /// A transaction failed signature, nonce, or balance validation.
    #[error("invalid transaction: {0}")]
    InvalidTx(String),

    /// The block's predecessor is unknown; it has been buffered in the
    /// orphan pool pending its parent's arrival.
    #[error("orphan block buffered")]
    OrphanBlock,

    /// An accounts-tree transaction is already open; the caller must retry
    /// once the current transaction closes.
    #[error("accounts tree transaction already open")]
    TxBusy,
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
