//! # Outbound Port - OutboundSink
//!
//! Where a session writes its packets. The transport implements it with the
//! connection's write queue.

/// Write side of one connection.
pub trait OutboundSink: Send + Sync {
    /// Queue the packets of one message. Returns `false` when the
    /// connection is gone and the message was discarded.
    fn send(&self, packets: Vec<Vec<u8>>) -> bool;

    fn is_open(&self) -> bool;
}

/// Sink capturing packets in memory, for testing.
#[cfg(test)]
#[derive(Default)]
pub struct MockSink {
    messages: parking_lot::Mutex<Vec<Vec<Vec<u8>>>>,
    closed: std::sync::atomic::AtomicBool,
    notify: tokio::sync::Notify,
}

#[cfg(test)]
impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<Vec<Vec<u8>>> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Wait until at least `count` messages were written.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
impl OutboundSink for MockSink {
    fn send(&self, packets: Vec<Vec<u8>>) -> bool {
        if !self.is_open() {
            return false;
        }
        self.messages.lock().push(packets);
        self.notify.notify_waiters();
        true
    }

    fn is_open(&self) -> bool {
        !self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }
}
