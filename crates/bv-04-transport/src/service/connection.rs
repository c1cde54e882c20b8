//! One accepted socket.

use crate::domain::WriteQueue;
use bv_03_session::Reassembler;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;

/// Unregistered peers only send a handshake or a shutdown, both tiny.
const BOOTSTRAP_MAX_PARTIAL: usize = 4;
const BOOTSTRAP_MAX_BYTES: usize = 64 * 1024;

pub(crate) struct Connection {
    pub id: u64,
    pub peer: SocketAddr,
    pub queue: Arc<WriteQueue>,
    /// Set once the bootstrap handshake registered a session.
    pub session: Mutex<Option<String>>,
    /// Reassembly of messages sent before registration.
    pub bootstrap: Mutex<Reassembler>,
    /// Wakes the reader when the connection is closed from our side.
    pub closed: Notify,
}

impl Connection {
    pub fn new(id: u64, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            queue: Arc::new(WriteQueue::new()),
            session: Mutex::new(None),
            bootstrap: Mutex::new(Reassembler::with_byte_limit(
                BOOTSTRAP_MAX_PARTIAL,
                BOOTSTRAP_MAX_BYTES,
            )),
            closed: Notify::new(),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.lock().clone()
    }
}
