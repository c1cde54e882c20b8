//! # Zero-Conf Actor
//!
//! The single writer. Drains the action queue in submission order; a
//! queued batch is awaited (bounded by its timeout) before the next action
//! runs, so a purge never overtakes a batch announced before it.

use super::engine::EngineInner;
use crate::domain::{
    purge, resolve_batch, ParsedTx, ParsedTxState, PurgeResult, SnapshotBuilder,
    ZcBatch,
};
use shared_bus::{error_codes, IndexerEvent};
use shared_types::entities::{hash_to_hex, ScrAddr};
use shared_types::keys::TxKey;
use shared_types::ports::ReorgState;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

pub(crate) enum Action {
    NewBatch {
        batch: Arc<ZcBatch>,
        timeout: Duration,
    },
    Purge {
        reorg: ReorgState,
        reply: oneshot::Sender<PurgeResult>,
    },
    Shutdown,
}

/// Per-session changes produced by one batch.
#[derive(Default)]
struct SessionDelta {
    new_keys: BTreeSet<TxKey>,
    invalidated: BTreeSet<TxKey>,
    addresses: BTreeSet<ScrAddr>,
}

pub(crate) struct Actor {
    inner: Arc<EngineInner>,
    /// Unresolved txs retried with the next batch.
    parked: Vec<ParsedTx>,
}

impl Actor {
    pub fn new(inner: Arc<EngineInner>) -> Self {
        Self {
            inner,
            parked: Vec::new(),
        }
    }

    pub async fn run(mut self, mut actions: mpsc::UnboundedReceiver<Action>) {
        while let Some(action) = actions.recv().await {
            match action {
                Action::NewBatch { batch, timeout } => {
                    if !batch.wait_ready(timeout).await {
                        debug!(size = batch.len(), "Batch timed out, parsing partial result");
                    }
                    self.parse_batch(&batch).await;
                }
                Action::Purge { reorg, reply } => {
                    let result = self.purge(&reorg);
                    let _ = reply.send(result);
                }
                Action::Shutdown => break,
            }
        }
        debug!(parked = self.parked.len(), "Zero-conf actor exiting");
    }

    async fn parse_batch(&mut self, batch: &ZcBatch) {
        let inner = Arc::clone(&self.inner);
        inner.counters.batches.fetch_add(1, Ordering::Relaxed);

        let current = inner.current();
        let now = inner.clock.now();
        let fetched = batch.take_fetched();
        let fetched_hashes: BTreeSet<_> = fetched.iter().map(|(hash, _, _)| *hash).collect();
        for (hash, _) in batch.entries() {
            if !fetched_hashes.contains(hash) {
                // never arrived; a broadcast watcher reports on timeout
                inner.pending.remove(hash);
            }
        }

        let mut txs: Vec<ParsedTx> = Vec::with_capacity(fetched.len() + self.parked.len());
        for (hash, key, raw) in fetched {
            txs.push(ParsedTx::from_raw(key, hash, raw, now));
        }
        for mut tx in self.parked.drain(..) {
            tx.reset_resolution();
            txs.push(tx);
        }
        txs.retain(|tx| {
            let known = current.key_for_hash(&tx.hash).is_some()
                || inner.store.tx_key_for_hash(&tx.hash).is_some();
            if known {
                inner.pending.remove(&tx.hash);
            }
            !known
        });
        txs.sort_by_key(|tx| tx.key);

        resolve_batch(&mut txs, &current, inner.store.as_ref());

        let mut builder = SnapshotBuilder::from_snapshot(&current);
        let mut deltas: BTreeMap<String, SessionDelta> = BTreeMap::new();
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        let mut changed = false;

        for mut tx in txs {
            match tx.state {
                ParsedTxState::Resolved => {
                    // newcomer wins: evict earlier spenders of the same outpoints
                    for outpoint in tx.inputs.iter().map(|i| i.outpoint) {
                        let Some(loser) = builder.view().spender_of(&outpoint) else {
                            continue;
                        };
                        for evicted in builder.remove_with_descendants(&loser) {
                            warn!(
                                zc_key = %evicted.key,
                                replaced_by = %tx.key,
                                "Zero-conf tx replaced"
                            );
                            inner.counters.replaced.fetch_add(1, Ordering::Relaxed);
                            inner.pending.remove(&evicted.hash);
                            accepted.retain(|(k, _)| *k != evicted.key);
                            changed = true;
                            self.record(&mut deltas, &evicted, false);
                        }
                    }
                    let orphaned = tx.inputs.iter().filter_map(|i| i.resolved).any(|r| {
                        r.is_zero_conf() && builder.view().tx(&r.output_key.tx_key()).is_none()
                    });
                    if orphaned {
                        tx.state = ParsedTxState::Invalid;
                        rejected.push(tx);
                        continue;
                    }
                    self.record(&mut deltas, &tx, true);
                    accepted.push((tx.key, tx.hash));
                    builder.insert(tx);
                    changed = true;
                }
                ParsedTxState::Unresolved => {
                    tx.failed_passes += 1;
                    if tx.failed_passes >= inner.config.max_unresolved_passes {
                        warn!(
                            zc_key = %tx.key,
                            tx = %hash_to_hex(&tx.hash),
                            passes = tx.failed_passes,
                            "Unresolved zero-conf tx dropped"
                        );
                        inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
                        inner.pending.remove(&tx.hash);
                    } else {
                        self.parked.push(tx);
                    }
                }
                _ => rejected.push(tx),
            }
        }

        if changed {
            let next = builder.build();
            debug_assert!(next.is_consistent());
            inner.snapshot.send_replace(Arc::new(next));
        }

        for (key, hash) in &accepted {
            inner.pending.remove(hash);
            inner.watchers.remove(hash);
            debug!(zc_key = %key, tx = %hash_to_hex(hash), "Zero-conf tx accepted");
        }
        inner
            .counters
            .accepted
            .fetch_add(accepted.len() as u64, Ordering::Relaxed);

        for tx in rejected {
            inner.counters.invalid.fetch_add(1, Ordering::Relaxed);
            inner.pending.remove(&tx.hash);
            debug!(zc_key = %tx.key, tx = %hash_to_hex(&tx.hash), "Invalid zero-conf tx");
            inner
                .fail_broadcast(
                    &tx.hash,
                    "transaction conflicts with the chain".to_string(),
                    error_codes::ZC_BROADCAST_INVALID,
                )
                .await;
        }

        for (session_id, delta) in deltas {
            inner
                .publisher
                .publish(IndexerEvent::ZeroConf {
                    session_id,
                    new_keys: delta.new_keys.into_iter().collect(),
                    invalidated: delta.invalidated.into_iter().collect(),
                    addresses: delta.addresses.into_iter().collect(),
                })
                .await;
        }
    }

    /// Attribute a tx's addresses to the sessions watching them.
    fn record(&self, deltas: &mut BTreeMap<String, SessionDelta>, tx: &ParsedTx, added: bool) {
        for addr in tx.addresses() {
            for session in self.inner.interest.sessions_for(&addr) {
                let delta = deltas.entry(session).or_default();
                if added {
                    delta.new_keys.insert(tx.key);
                } else {
                    delta.new_keys.remove(&tx.key);
                    delta.invalidated.insert(tx.key);
                }
                delta.addresses.insert(addr);
            }
        }
    }

    fn purge(&mut self, reorg: &ReorgState) -> PurgeResult {
        let inner = &self.inner;
        inner.counters.purges.fetch_add(1, Ordering::Relaxed);
        let current = inner.current();
        let (next, result) = purge(&current, inner.store.as_ref(), reorg);
        debug_assert!(next.is_consistent());
        inner.snapshot.send_replace(Arc::new(next));

        self.parked.retain(|tx| {
            let mined = inner.store.tx_key_for_hash(&tx.hash).is_some();
            if mined {
                inner.pending.remove(&tx.hash);
            }
            !mined
        });
        info!(
            height = reorg.new_top.height,
            mined = result.mined.len(),
            invalidated = result.invalidated.len(),
            "Zero-conf purge complete"
        );
        result
    }
}
