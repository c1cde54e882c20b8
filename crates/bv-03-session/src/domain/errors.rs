//! Session and packet errors.

use bv_02_wallet_view::ViewError;
use shared_types::errors::{ErrorKind, TxParseError};
use thiserror::Error;

/// Errors decoding or building wire packets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("Empty packet")]
    Empty,

    #[error("Unknown packet type {0}")]
    UnknownType(u8),

    #[error("Truncated packet: {0}")]
    Truncated(#[from] TxParseError),

    /// A fragmented message must have at least two fragments.
    #[error("Invalid fragment count {0}")]
    FragmentCount(u16),

    #[error("Fragment {seq} out of range for message {msg_id} ({count} fragments)")]
    Sequence { msg_id: u32, seq: u64, count: u16 },

    #[error("Message of {len} bytes needs more than {max} fragments")]
    TooLarge { len: usize, max: usize },

    #[error("Partial message {msg_id} dropped, reassembly buffer over {limit} bytes")]
    BufferFull { msg_id: u32, limit: usize },

    #[error("Packet size {0} too small to carry a fragment")]
    PacketSize(usize),

    /// Message bytes failed to encode or decode.
    #[error("Codec error: {0}")]
    Codec(String),
}

impl PacketError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Protocol
    }
}

/// Errors raised while handling a command.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown method {0}")]
    UnknownMethod(u32),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Unknown session {0}")]
    UnknownSession(String),

    /// Bad magic word or cookie on a bootstrap command.
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Session closed")]
    Closed,

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error(transparent)]
    View(#[from] ViewError),
}

impl SessionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_)
            | Self::UnknownMethod(_)
            | Self::MissingField(_)
            | Self::UnknownSession(_)
            | Self::Unauthorized(_) => ErrorKind::Request,
            Self::Closed => ErrorKind::Transport,
            Self::Packet(e) => e.kind(),
            Self::View(e) => e.kind(),
        }
    }

    /// Numeric code placed in `Error` responses.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.kind().code()
    }
}
