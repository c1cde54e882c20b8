//! Transport errors.

use bv_03_session::{PacketError, SessionError};
use shared_types::errors::ErrorKind;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Closes the connection that sent it.
    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Server replied with an unexpected message")]
    UnexpectedMessage,

    /// The server answered with an `Error` response.
    #[error("Rejected ({code}): {message}")]
    Rejected { code: i32, message: String },

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl TransportError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FrameTooLarge { .. } | Self::UnexpectedMessage | Self::Packet(_) => {
                ErrorKind::Protocol
            }
            Self::Session(e) => e.kind(),
            Self::Rejected { .. } => ErrorKind::Request,
            Self::Io(_) | Self::Bind { .. } | Self::ConnectionClosed => ErrorKind::Transport,
        }
    }
}
