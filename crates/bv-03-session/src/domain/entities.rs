//! Session engine configuration.

use super::reassembly::{DEFAULT_MAX_BUFFERED_BYTES, DEFAULT_MAX_PARTIAL};
use bv_02_wallet_view::ViewConfig;

/// Default size of one wire packet, in bytes.
pub const DEFAULT_PACKET_SIZE: usize = 1_500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Configuration of each session's wallet view.
    pub view: ViewConfig,
    /// Largest packet written to the wire; bigger messages are fragmented.
    pub packet_size: usize,
    /// Partially received messages kept per session.
    pub max_partial_messages: usize,
    /// Bytes those partial messages may hold in total.
    pub max_buffered_bytes: usize,
    /// Capacity of the event bus carrying notifications to sessions.
    pub notification_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            view: ViewConfig::default(),
            packet_size: DEFAULT_PACKET_SIZE,
            max_partial_messages: DEFAULT_MAX_PARTIAL,
            max_buffered_bytes: DEFAULT_MAX_BUFFERED_BYTES,
            notification_capacity: 1_024,
        }
    }
}
