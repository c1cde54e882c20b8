//! Zero-conf error types.

use shared_types::entities::{hash_to_hex, Hash};
use shared_types::errors::{ErrorKind, FeedError, StoreError, TxParseError};
use thiserror::Error;

/// All errors raised by the zero-conf engine.
#[derive(Debug, Error)]
pub enum ZeroConfError {
    /// Raw bytes are not a transaction.
    #[error("Malformed transaction: {0}")]
    Parse(#[from] TxParseError),

    /// A coinbase cannot enter the mempool.
    #[error("Coinbase transactions are not relayed")]
    Coinbase,

    /// The node is not connected, nothing can be broadcast.
    #[error("Node is offline")]
    Offline,

    /// The node refused or failed a request.
    #[error("Node feed error: {0}")]
    Feed(#[from] FeedError),

    /// A broadcast transaction never showed up in the mempool.
    #[error("Broadcast of {} timed out", hash_to_hex(.hash))]
    BroadcastTimeout { hash: Hash },

    /// The transaction is already confirmed.
    #[error("Transaction {} is already mined", hash_to_hex(.hash))]
    AlreadyMined { hash: Hash },

    /// The engine stopped accepting work.
    #[error("Zero-conf engine is shut down")]
    Shutdown,

    /// Chain store failure.
    #[error("Chain store error: {0}")]
    Store(#[from] StoreError),
}

impl ZeroConfError {
    /// Position in the shared error taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) | Self::Coinbase | Self::AlreadyMined { .. } => ErrorKind::Request,
            Self::BroadcastTimeout { .. } => ErrorKind::Resolution,
            Self::Feed(e) => e.kind(),
            Self::Offline | Self::Shutdown | Self::Store(_) => ErrorKind::Internal,
        }
    }
}
