//! View error types.

use bv_01_zero_conf::ZeroConfError;
use shared_types::errors::{ErrorKind, FeedError, StoreError};
use thiserror::Error;

/// All errors raised by a wallet view.
#[derive(Debug, Error)]
pub enum ViewError {
    /// Unknown wallet, lockbox, delegate, transaction or header.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// The view has not completed its initial scan.
    #[error("View is not ready, call GoOnline first")]
    NotReady,

    /// Arguments are out of range or inconsistent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    ZeroConf(#[from] ZeroConfError),

    #[error("Node feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Chain store error: {0}")]
    Store(#[from] StoreError),
}

impl ViewError {
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    /// Position in the shared error taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::InvalidRequest(_) => ErrorKind::Request,
            Self::NotReady => ErrorKind::NotReady,
            Self::ZeroConf(e) => e.kind(),
            Self::Feed(e) => e.kind(),
            Self::Store(_) => ErrorKind::Internal,
        }
    }
}
