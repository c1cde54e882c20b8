//! # Fetch Batches
//!
//! One inventory announcement (or one broadcast) becomes a `ZcBatch`: a set
//! of hashes with keys reserved up front, filled in by fetch workers and
//! consumed by the parser once every slot completed or the timeout fired.

use parking_lot::Mutex;
use shared_types::entities::Hash;
use shared_types::keys::TxKey;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Who asked for the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchSource {
    /// Inventory from the node.
    Network,
    /// A client broadcast; errors go back to this session.
    Broadcast { session_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Pending,
    Fetched(Vec<u8>),
    Failed,
}

/// A group of transactions fetched and parsed together.
#[derive(Debug)]
pub struct ZcBatch {
    /// Hashes with the zero-conf key reserved for each.
    entries: Vec<(Hash, TxKey)>,
    slots: Mutex<Vec<Slot>>,
    remaining: AtomicUsize,
    ready: Notify,
    source: BatchSource,
}

impl ZcBatch {
    #[must_use]
    pub fn new(entries: Vec<(Hash, TxKey)>, source: BatchSource) -> Self {
        let len = entries.len();
        Self {
            slots: Mutex::new(vec![Slot::Pending; len]),
            remaining: AtomicUsize::new(len),
            ready: Notify::new(),
            entries,
            source,
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[(Hash, TxKey)] {
        &self.entries
    }

    #[must_use]
    pub fn source(&self) -> &BatchSource {
        &self.source
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record the outcome of fetching entry `index`. A slot completes once;
    /// later calls for the same slot are ignored.
    pub fn complete(&self, index: usize, raw: Option<Vec<u8>>) {
        {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(index) else {
                return;
            };
            if *slot != Slot::Pending {
                return;
            }
            *slot = raw.map_or(Slot::Failed, Slot::Fetched);
        }
        // notify_one stores a permit, so a waiter arriving late still wakes
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.ready.notify_one();
        }
    }

    /// Every slot reported back.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }

    /// Wait until every slot completed or `timeout` elapsed.
    ///
    /// Returns `true` when the batch filled in time.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        if self.is_empty() || self.is_ready() {
            return true;
        }
        let _ = tokio::time::timeout(timeout, self.ready.notified()).await;
        self.is_ready()
    }

    /// Fetched entries, in announcement order. Entries that never arrived
    /// are left out.
    #[must_use]
    pub fn take_fetched(&self) -> Vec<(Hash, TxKey, Vec<u8>)> {
        let mut slots = self.slots.lock();
        self.entries
            .iter()
            .zip(slots.iter_mut())
            .filter_map(|(&(hash, key), slot)| match std::mem::replace(slot, Slot::Failed) {
                Slot::Fetched(raw) => Some((hash, key, raw)),
                Slot::Pending | Slot::Failed => None,
            })
            .collect()
    }
}
