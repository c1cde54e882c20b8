//! # Address Filter
//!
//! The single source of truth for "is this address watched, and by whom".
//! Registrations are queued and applied in batches by one task; each
//! request is acknowledged once the batch holding it has been applied.
//!
//! ```text
//! register(session, addrs) ──→ queue ──→ [filter task] ──apply batch──→ watched
//!        ↑                                     │
//!        └────────── oneshot ack ──────────────┘
//! ```

use bv_01_zero_conf::ZcInterest;
use dashmap::DashMap;
use shared_types::entities::ScrAddr;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

enum FilterRequest {
    Register {
        session_id: String,
        addrs: Vec<ScrAddr>,
        done: oneshot::Sender<()>,
    },
    Release {
        session_id: String,
    },
}

/// Shared address → sessions map with batched, acknowledged registration.
pub struct AddressFilter {
    watched: Arc<DashMap<ScrAddr, BTreeSet<String>>>,
    /// Addresses queued but not yet applied.
    queued: Arc<AtomicUsize>,
    requests: mpsc::UnboundedSender<FilterRequest>,
}

impl AddressFilter {
    /// Create the filter and spawn its batch task. Must run inside a tokio
    /// runtime.
    pub fn start() -> Arc<Self> {
        let (requests, rx) = mpsc::unbounded_channel();
        let watched = Arc::new(DashMap::new());
        let queued = Arc::new(AtomicUsize::new(0));
        tokio::spawn(run_batches(rx, Arc::clone(&watched), Arc::clone(&queued)));
        Arc::new(Self {
            watched,
            queued,
            requests,
        })
    }

    /// Queue `addrs` for `session_id`. The receiver fires once they are
    /// watched.
    pub fn register(&self, session_id: &str, addrs: Vec<ScrAddr>) -> oneshot::Receiver<()> {
        let (done, rx) = oneshot::channel();
        let count = addrs.len();
        self.queued.fetch_add(count, Ordering::AcqRel);
        let request = FilterRequest::Register {
            session_id: session_id.to_string(),
            addrs,
            done,
        };
        if self.requests.send(request).is_err() {
            self.queued.fetch_sub(count, Ordering::AcqRel);
        }
        rx
    }

    /// Stop watching on behalf of `session_id`, after anything it queued.
    pub fn release(&self, session_id: &str) {
        let _ = self.requests.send(FilterRequest::Release {
            session_id: session_id.to_string(),
        });
    }

    #[must_use]
    pub fn is_watched(&self, addr: &ScrAddr) -> bool {
        self.watched.contains_key(addr)
    }

    #[must_use]
    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }
}

impl ZcInterest for AddressFilter {
    fn sessions_for(&self, addr: &ScrAddr) -> Vec<String> {
        self.watched
            .get(addr)
            .map(|sessions| sessions.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Queued registrations count: a transaction funding an address being
    /// registered must not be skipped.
    fn has_watched(&self) -> bool {
        !self.watched.is_empty() || self.queued.load(Ordering::Acquire) > 0
    }
}

async fn run_batches(
    mut rx: mpsc::UnboundedReceiver<FilterRequest>,
    watched: Arc<DashMap<ScrAddr, BTreeSet<String>>>,
    queued: Arc<AtomicUsize>,
) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        let mut acks = Vec::new();
        let mut applied = 0usize;
        for request in batch {
            match request {
                FilterRequest::Register {
                    session_id,
                    addrs,
                    done,
                } => {
                    applied += addrs.len();
                    for addr in addrs {
                        watched.entry(addr).or_default().insert(session_id.clone());
                    }
                    acks.push(done);
                }
                FilterRequest::Release { session_id } => {
                    watched.retain(|_, sessions| {
                        sessions.remove(&session_id);
                        !sessions.is_empty()
                    });
                    debug!(session_id = %session_id, "Address registrations released");
                }
            }
        }
        queued.fetch_sub(applied, Ordering::AcqRel);
        debug!(
            addresses = applied,
            requests = acks.len(),
            watched = watched.len(),
            "Address filter batch applied"
        );
        for done in acks {
            let _ = done.send(());
        }
    }
}
