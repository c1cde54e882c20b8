//! # Write Queue
//!
//! Per-connection FIFO of outbound messages, each a list of wire-sized
//! packets. The writer pops one packet at a time from the front message,
//! moves to the next message once it is drained, and sleeps on
//! [`WriteQueue::notified`] when the queue is empty.

use bv_03_session::OutboundSink;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct WriteQueue {
    messages: Mutex<VecDeque<VecDeque<Vec<u8>>>>,
    closed: AtomicBool,
    notify: Notify,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next packet to write, if any.
    pub fn pop_packet(&self) -> Option<Vec<u8>> {
        let mut messages = self.messages.lock();
        loop {
            let front = messages.front_mut()?;
            match front.pop_front() {
                Some(packet) => {
                    if front.is_empty() {
                        messages.pop_front();
                    }
                    return Some(packet);
                }
                None => {
                    messages.pop_front();
                }
            }
        }
    }

    /// Put back a packet that could not be written.
    pub fn requeue(&self, packet: Vec<u8>) {
        self.messages
            .lock()
            .push_front(VecDeque::from(vec![packet]));
    }

    /// Messages not yet fully written.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.messages.lock().len()
    }

    /// Resolves after the next push or close.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Discard everything queued and refuse further messages.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.messages.lock().clear();
        self.notify.notify_one();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl OutboundSink for WriteQueue {
    fn send(&self, packets: Vec<Vec<u8>>) -> bool {
        if self.is_closed() {
            return false;
        }
        if !packets.is_empty() {
            self.messages.lock().push_back(packets.into());
            self.notify.notify_one();
        }
        true
    }

    fn is_open(&self) -> bool {
        !self.is_closed()
    }
}
