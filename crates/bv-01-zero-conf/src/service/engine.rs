//! # Zero-Conf Engine
//!
//! Front half of the engine: accepts inventory and broadcasts, reserves
//! keys, runs fetches on a bounded pool and hands batches to the actor.
//! The actor (see `actor.rs`) is the only writer of the snapshot.
//!
//! ```text
//! process_inv ──reserve keys──→ ZcBatch ──queue──→ [actor] ──→ watch<Arc<Snapshot>>
//!      │                          ↑                   ↑
//!      └──spawn fetch tasks───────┘ complete(i)       └── purge / shutdown
//! ```

use super::actor::{Action, Actor};
use crate::domain::{BatchSource, MempoolSnapshot, PurgeResult, ZcBatch, ZeroConfConfig, ZeroConfError};
use crate::ports::{ChainStore, NodeFeed, SystemTimeSource, TimeSource, ZcInterest, ZeroConfApi};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use shared_bus::{error_codes, EventPublisher, IndexerEvent};
use shared_types::entities::{hash_to_hex, Hash};
use shared_types::keys::TxKey;
use shared_types::ports::ReorgState;
use shared_types::tx::Transaction;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Running counters, readable at any time.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub batches: AtomicU64,
    pub accepted: AtomicU64,
    pub replaced: AtomicU64,
    pub invalid: AtomicU64,
    pub dropped: AtomicU64,
    pub purges: AtomicU64,
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub batches: u64,
    pub accepted: u64,
    pub replaced: u64,
    pub invalid: u64,
    pub dropped: u64,
    pub purges: u64,
    pub pending: usize,
    pub fetch_workers: usize,
}

/// State shared between the front half and the actor.
pub(crate) struct EngineInner {
    pub config: ZeroConfConfig,
    pub store: Arc<dyn ChainStore>,
    pub feed: Arc<dyn NodeFeed>,
    pub publisher: Arc<dyn EventPublisher>,
    pub interest: Arc<dyn ZcInterest>,
    pub clock: Arc<dyn TimeSource>,
    pub snapshot: watch::Sender<Arc<MempoolSnapshot>>,
    /// Hashes queued or parked, not yet in the snapshot.
    pub pending: DashMap<Hash, TxKey>,
    /// Broadcast hashes awaiting acceptance, with the originating session.
    pub watchers: DashMap<Hash, String>,
    pub counters: Counters,
    actions: mpsc::UnboundedSender<Action>,
    next_id: AtomicU32,
    fetch_permits: Arc<Semaphore>,
    fetch_workers: AtomicUsize,
}

impl EngineInner {
    pub fn current(&self) -> Arc<MempoolSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Report a broadcast failure once; later reports for the same hash
    /// are no-ops.
    pub async fn fail_broadcast(&self, hash: &Hash, message: String, code: i32) {
        let Some((_, session_id)) = self.watchers.remove(hash) else {
            return;
        };
        warn!(tx = %hash_to_hex(hash), session_id = %session_id, %message, "Broadcast failed");
        self.publisher
            .publish(IndexerEvent::Error {
                session_id,
                message,
                code,
                tx_hash: Some(*hash),
            })
            .await;
    }
}

/// The zero-conf engine handle. Cheap to clone.
#[derive(Clone)]
pub struct ZeroConfEngine {
    inner: Arc<EngineInner>,
    actor: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ZeroConfEngine {
    /// Spawn the actor and return a handle. Must run inside a tokio runtime.
    pub fn start(
        config: ZeroConfConfig,
        store: Arc<dyn ChainStore>,
        feed: Arc<dyn NodeFeed>,
        publisher: Arc<dyn EventPublisher>,
        interest: Arc<dyn ZcInterest>,
    ) -> Self {
        Self::start_with_clock(config, store, feed, publisher, interest, Arc::new(SystemTimeSource))
    }

    /// Like `start`, with an explicit first-seen clock.
    pub fn start_with_clock(
        config: ZeroConfConfig,
        store: Arc<dyn ChainStore>,
        feed: Arc<dyn NodeFeed>,
        publisher: Arc<dyn EventPublisher>,
        interest: Arc<dyn ZcInterest>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let (actions, rx) = mpsc::unbounded_channel();
        let (snapshot, _) = watch::channel(Arc::new(MempoolSnapshot::default()));
        let inner = Arc::new(EngineInner {
            config,
            store,
            feed,
            publisher,
            interest,
            clock,
            snapshot,
            pending: DashMap::new(),
            watchers: DashMap::new(),
            counters: Counters::default(),
            actions,
            next_id: AtomicU32::new(0),
            fetch_permits: Arc::new(Semaphore::new(1)),
            fetch_workers: AtomicUsize::new(1),
        });
        let handle = tokio::spawn(Actor::new(Arc::clone(&inner)).run(rx));
        info!(
            max_fetch_workers = inner.config.max_fetch_workers,
            fetch_timeout_ms = inner.config.fetch_timeout.as_millis() as u64,
            "Zero-conf engine started"
        );
        Self {
            inner,
            actor: Arc::new(Mutex::new(Some(handle))),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ZeroConfConfig {
        &self.inner.config
    }

    /// Receiver that sees every published snapshot.
    #[must_use]
    pub fn subscribe_snapshots(&self) -> watch::Receiver<Arc<MempoolSnapshot>> {
        self.inner.snapshot.subscribe()
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let c = &self.inner.counters;
        EngineStats {
            batches: c.batches.load(Ordering::Relaxed),
            accepted: c.accepted.load(Ordering::Relaxed),
            replaced: c.replaced.load(Ordering::Relaxed),
            invalid: c.invalid.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            purges: c.purges.load(Ordering::Relaxed),
            pending: self.inner.pending.len(),
            fetch_workers: self.inner.fetch_workers.load(Ordering::Relaxed),
        }
    }

    /// Let one more fetch run concurrently, up to the configured maximum.
    fn grow_fetch_pool(&self) {
        let max = self.inner.config.max_fetch_workers.max(1);
        let grown = self
            .inner
            .fetch_workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1));
        if let Ok(previous) = grown {
            self.inner.fetch_permits.add_permits(1);
            debug!(workers = previous + 1, "Fetch pool grown");
        }
    }

    /// Reserve keys for unseen hashes and queue them as one batch.
    fn queue_batch(
        &self,
        hashes: Vec<Hash>,
        source: BatchSource,
        timeout: Duration,
    ) -> Result<usize, ZeroConfError> {
        let inner = &self.inner;
        let snapshot = inner.current();
        let mut seen = HashSet::with_capacity(hashes.len());
        let mut entries = Vec::with_capacity(hashes.len());

        for hash in hashes {
            if !seen.insert(hash) || snapshot.key_for_hash(&hash).is_some() {
                continue;
            }
            if inner.store.tx_key_for_hash(&hash).is_some() {
                continue;
            }
            if let Entry::Vacant(slot) = inner.pending.entry(hash) {
                let key = TxKey::zero_conf(inner.next_id.fetch_add(1, Ordering::Relaxed));
                slot.insert(key);
                entries.push((hash, key));
            }
        }
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = Arc::new(ZcBatch::new(entries, source));
        if inner
            .actions
            .send(Action::NewBatch {
                batch: Arc::clone(&batch),
                timeout,
            })
            .is_err()
        {
            for (hash, _) in batch.entries() {
                inner.pending.remove(hash);
            }
            return Err(ZeroConfError::Shutdown);
        }

        for (index, (hash, _)) in batch.entries().iter().enumerate() {
            let hash = *hash;
            let batch = Arc::clone(&batch);
            let feed = Arc::clone(&inner.feed);
            let permits = Arc::clone(&inner.fetch_permits);
            tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    batch.complete(index, None);
                    return;
                };
                match feed.fetch_tx(&hash, timeout).await {
                    Ok(raw) => batch.complete(index, Some(raw)),
                    Err(e) => {
                        debug!(tx = %hash_to_hex(&hash), error = %e, "Fetch failed");
                        batch.complete(index, None);
                    }
                }
            });
        }

        debug!(count = batch.len(), "Zero-conf batch queued");
        Ok(batch.len())
    }
}

#[async_trait]
impl ZeroConfApi for ZeroConfEngine {
    async fn process_inv(
        &self,
        hashes: Vec<Hash>,
        extend: bool,
        timeout: Duration,
    ) -> Result<usize, ZeroConfError> {
        if extend {
            if !self.inner.interest.has_watched() {
                debug!(count = hashes.len(), "No watched addresses, inventory skipped");
                return Ok(0);
            }
            self.grow_fetch_pool();
        }
        self.queue_batch(hashes, BatchSource::Network, timeout)
    }

    async fn broadcast_zc(&self, session_id: &str, raw: Vec<u8>) -> Result<Hash, ZeroConfError> {
        let tx = Transaction::parse(&raw)?;
        if tx.is_coinbase() {
            return Err(ZeroConfError::Coinbase);
        }
        let hash = tx.hash();
        if self.inner.store.tx_key_for_hash(&hash).is_some() {
            return Err(ZeroConfError::AlreadyMined { hash });
        }
        if self.inner.current().key_for_hash(&hash).is_some() {
            debug!(tx = %hash_to_hex(&hash), "Broadcast of a pooled tx");
            return Ok(hash);
        }
        if !self.inner.feed.is_connected() {
            return Err(ZeroConfError::Offline);
        }

        self.inner.watchers.insert(hash, session_id.to_string());
        if let Err(e) = self.inner.feed.broadcast_tx(&raw).await {
            self.inner.watchers.remove(&hash);
            return Err(e.into());
        }

        let timeout = self.inner.config.broadcast_timeout;
        let source = BatchSource::Broadcast {
            session_id: session_id.to_string(),
        };
        if let Err(e) = self.queue_batch(vec![hash], source, timeout) {
            self.inner.watchers.remove(&hash);
            return Err(e);
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            inner
                .fail_broadcast(
                    &hash,
                    format!("broadcast timed out after {} ms", timeout.as_millis()),
                    error_codes::ZC_BROADCAST_TIMEOUT,
                )
                .await;
        });

        info!(tx = %hash_to_hex(&hash), session_id = %session_id, "Transaction broadcast");
        Ok(hash)
    }

    async fn purge(&self, reorg: ReorgState) -> Result<PurgeResult, ZeroConfError> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .actions
            .send(Action::Purge { reorg, reply })
            .map_err(|_| ZeroConfError::Shutdown)?;
        rx.await.map_err(|_| ZeroConfError::Shutdown)
    }

    fn snapshot(&self) -> Arc<MempoolSnapshot> {
        self.inner.current()
    }

    async fn shutdown(&self) {
        let _ = self.inner.actions.send(Action::Shutdown);
        let handle = self.actor.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Zero-conf actor ended abnormally");
            }
        }
        self.inner.fetch_permits.close();
        info!("Zero-conf engine stopped");
    }
}
