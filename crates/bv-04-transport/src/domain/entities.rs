//! Transport configuration and signals.

use super::codec::DEFAULT_MAX_FRAME_SIZE;
use bv_03_session::DEFAULT_PACKET_SIZE;
use std::net::{Ipv4Addr, SocketAddr};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 9_001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub listen_addr: SocketAddr,
    /// Workers routing inbound frames.
    pub workers: usize,
    pub max_frame_size: usize,
    /// Largest packet written to the wire.
    pub packet_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            workers: 2,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            packet_size: DEFAULT_PACKET_SIZE,
        }
    }
}

/// Secrets checked by the bootstrap handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Network magic word a client must present to register.
    pub network_magic: Vec<u8>,
    /// Shared secret gating the shutdown commands.
    pub cookie: String,
}

/// Shutdown asked for by an authenticated client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    /// Stop serving clients.
    Server,
    /// Stop the whole node.
    Node,
}
