//! # Inbound Port - SessionApi
//!
//! The session table as seen by the transport: open a session for a
//! connection that passed the bootstrap handshake, feed it packets, close it.

use crate::domain::SessionError;
use crate::ports::outbound::OutboundSink;
use std::sync::Arc;

pub trait SessionApi: Send + Sync {
    /// Create a session writing to `sink`; returns its id.
    fn open(&self, sink: Arc<dyn OutboundSink>) -> String;

    /// Queue one raw packet on a session's mailbox.
    fn deliver(&self, session_id: &str, packet: Vec<u8>) -> Result<(), SessionError>;

    /// Close a session and release its registrations. Unknown ids are ignored.
    fn close(&self, session_id: &str);

    /// Number of live sessions.
    fn session_count(&self) -> usize;
}
