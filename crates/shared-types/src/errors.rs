//! # Error Types
//!
//! Errors raised at the shared boundaries: raw transaction parsing and the
//! Chain Store / Node Feed ports.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error taxonomy shared by every crate. Each crate's error enum maps
/// onto one of these through a `kind()` accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or unroutable frame.
    Protocol,
    /// Missing field, unknown id, not found.
    Request,
    /// Initial scan not complete.
    NotReady,
    /// A zero-conf parent is unresolved; transient.
    Resolution,
    /// Chain reorganized under the request; handled by a purge.
    ReorgConflict,
    /// Connection-scoped I/O failure.
    Transport,
    /// Collaborator or internal failure.
    Internal,
}

impl ErrorKind {
    /// Numeric code carried by `Error` responses.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Protocol => -32_700,
            Self::Request => -32_600,
            Self::NotReady => -32_001,
            Self::Resolution => -32_002,
            Self::ReorgConflict => -32_003,
            Self::Transport => -32_004,
            Self::Internal => -32_603,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Protocol => "protocol",
            Self::Request => "request",
            Self::NotReady => "not_ready",
            Self::Resolution => "resolution",
            Self::ReorgConflict => "reorg_conflict",
            Self::Transport => "transport",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Errors decoding a raw transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxParseError {
    /// Ran out of bytes mid-field.
    #[error("Unexpected end of data at offset {offset}, wanted {wanted} bytes")]
    UnexpectedEof { offset: usize, wanted: usize },

    /// A length prefix exceeds what the format allows.
    #[error("Length {len} out of range (max {max})")]
    LengthOutOfRange { len: u64, max: usize },

    /// A transaction with no inputs or no outputs.
    #[error("Transaction has no {0}")]
    Empty(&'static str),

    /// Bytes left over after the lock time.
    #[error("Trailing bytes after transaction: {0}")]
    TrailingBytes(usize),
}

/// Errors raised by a Chain Store implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Requested record is not in the store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored data failed to decode.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// The block does not extend the current top.
    #[error("Block at height {height} does not extend the chain")]
    Disconnected { height: u32 },

    /// Underlying storage failure.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Errors raised by a Node Feed implementation.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// The node does not know this transaction.
    #[error("Transaction not found on node: {0}")]
    NotFound(String),

    /// The node did not answer in time.
    #[error("Node request timed out after {0} ms")]
    Timeout(u64),

    /// The node is not connected.
    #[error("Node is offline")]
    Offline,

    /// The node refused the transaction.
    #[error("Node rejected transaction: {0}")]
    Rejected(String),
}

impl FeedError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::Request,
            Self::Timeout(_) | Self::Offline | Self::Rejected(_) => ErrorKind::Internal,
        }
    }
}
