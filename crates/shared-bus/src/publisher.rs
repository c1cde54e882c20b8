//! # Publishing Side
//!
//! Producers (ZeroConf engine, chain handler, wallet views) hold an
//! `Arc<dyn EventPublisher>`. They never learn who, if anyone, receives.
//!
//! ## Lanes
//!
//! | Target | Lane | Falling behind |
//! |--------|------|----------------|
//! | One session | unbounded mpsc per subscription | never loses events |
//! | Every session | `tokio::sync::broadcast` | skips ahead, counts the loss |
//!
//! Session-targeted events carry registration acks and mempool deltas a
//! client waits on, so they are never dropped.

use crate::events::{EventFilter, IndexerEvent, Target};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hand `event` to every live subscription; returns how many there were.
    /// An event nobody is subscribed to is dropped.
    async fn publish(&self, event: IndexerEvent) -> usize;

    /// Events handed to `publish` so far, delivered or not.
    fn events_published(&self) -> u64;
}

/// Process-local bus. Broadcast events share one `broadcast` channel where
/// each subscription keeps its own cursor; one that falls more than
/// `capacity` events behind skips ahead. Session-targeted events are
/// queued per subscription without bound.
pub struct InMemoryEventBus {
    fanout: broadcast::Sender<IndexerEvent>,
    direct: Mutex<Vec<mpsc::UnboundedSender<IndexerEvent>>>,
    published: AtomicU64,
    dropped: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// `capacity` bounds how far a subscription may lag on broadcast events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            fanout: broadcast::channel(capacity).0,
            direct: Mutex::new(Vec::new()),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            capacity,
        }
    }

    /// Only events published after this call are seen.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, "Bus subscription added");
        let (direct_tx, direct_rx) = mpsc::unbounded_channel();
        self.direct.lock().push(direct_tx);
        Subscription::new(self.fanout.subscribe(), direct_rx, filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.fanout.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events published while nobody was subscribed.
    #[must_use]
    pub fn events_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn send_direct(&self, event: IndexerEvent) -> usize {
        let mut direct = self.direct.lock();
        direct.retain(|tx| !tx.is_closed());
        direct
            .iter()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: IndexerEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let topic = event.topic();
        let targeted = matches!(event.target(), Target::Session(_));
        let receivers = if targeted {
            self.send_direct(event)
        } else {
            self.fanout.send(event).unwrap_or(0)
        };
        if receivers == 0 {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(?topic, "No subscribers, event dropped");
        } else {
            debug!(?topic, receivers, targeted, "Event published");
        }
        receivers
    }

    fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
