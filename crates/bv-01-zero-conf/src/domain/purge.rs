//! # Purge on New Block
//!
//! Reconciles the mempool with a new chain tip. Every pre-purge key ends up
//! in exactly one of three sets:
//!
//! | Set | Meaning |
//! |-----|---------|
//! | mined | now confirmed; mapped to its confirmed key |
//! | invalidated | conflicts with the chain, or descends from such a tx |
//! | kept | still a valid zero-conf tx |
//!
//! Kept children of mined parents are re-pointed at the confirmed outputs
//! and lose their chained flag when no zero-conf parent remains. On a
//! reorg the whole pool is re-resolved from scratch, since outputs it
//! relied on may be gone.

use super::entities::{ParsedTx, ParsedTxState};
use super::resolver::resolve_batch;
use super::snapshot::{MempoolSnapshot, SnapshotBuilder};
use shared_types::keys::TxKey;
use shared_types::ports::{ChainStore, ReorgState};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// What a purge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeResult {
    /// Zero-conf key to confirmed key.
    pub mined: BTreeMap<TxKey, TxKey>,
    pub invalidated: BTreeSet<TxKey>,
}

impl PurgeResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mined.is_empty() && self.invalidated.is_empty()
    }
}

/// Reconcile `snapshot` with the chain after `reorg`.
#[must_use]
pub fn purge(
    snapshot: &MempoolSnapshot,
    store: &dyn ChainStore,
    reorg: &ReorgState,
) -> (MempoolSnapshot, PurgeResult) {
    let mut result = PurgeResult::default();
    for (key, tx) in snapshot.iter() {
        if let Some(confirmed) = store.tx_key_for_hash(&tx.hash) {
            result.mined.insert(*key, confirmed);
        }
    }

    let next = if reorg.prev_top_still_valid() {
        purge_extension(snapshot, store, &mut result)
    } else {
        purge_reorg(snapshot, store, &mut result)
    };

    debug!(
        mined = result.mined.len(),
        invalidated = result.invalidated.len(),
        kept = next.len(),
        branch = reorg.branch_point.as_ref().map(|b| b.height),
        "Mempool purged"
    );
    (next, result)
}

/// The chain only grew: check each kept tx's inputs against the new state.
fn purge_extension(
    snapshot: &MempoolSnapshot,
    store: &dyn ChainStore,
    result: &mut PurgeResult,
) -> MempoolSnapshot {
    let mut repointed: BTreeMap<TxKey, ParsedTx> = BTreeMap::new();

    loop {
        let mut changed = false;
        for (key, tx) in snapshot.iter() {
            if result.mined.contains_key(key) || result.invalidated.contains(key) {
                continue;
            }
            let mut updated: Option<ParsedTx> = None;
            let mut invalid = false;

            for (n, input) in tx.inputs.iter().enumerate() {
                let Some(resolved) = input.resolved else {
                    continue;
                };
                let parent = resolved.output_key.tx_key();
                if parent.is_zero_conf() {
                    if result.invalidated.contains(&parent) {
                        invalid = true;
                        break;
                    }
                    let Some(confirmed) = result.mined.get(&parent) else {
                        continue;
                    };
                    // the parent is confirmed now, its output must be too
                    match store.output(&input.outpoint) {
                        Some(out) if out.spender.is_none() => {
                            let fresh = updated.get_or_insert_with(|| (**tx).clone());
                            let mut repoint = resolved;
                            repoint.output_key = confirmed.output(resolved.output_key.index());
                            fresh.inputs[n].resolved = Some(repoint);
                        }
                        _ => {
                            invalid = true;
                            break;
                        }
                    }
                } else {
                    match store.output(&input.outpoint) {
                        Some(out) if out.spender.is_none() => {}
                        _ => {
                            invalid = true;
                            break;
                        }
                    }
                }
            }

            if invalid {
                result.invalidated.insert(*key);
                repointed.remove(key);
                changed = true;
            } else if let Some(mut fresh) = updated {
                fresh.refresh_chained();
                repointed.insert(*key, fresh);
            }
        }
        if !changed {
            break;
        }
    }

    let mut builder = SnapshotBuilder::from_snapshot(snapshot);
    for key in result.mined.keys().chain(result.invalidated.iter()) {
        builder.remove(key);
    }
    for (key, fresh) in repointed {
        builder.remove(&key);
        builder.insert(fresh);
    }
    builder.build()
}

/// The previous top was unwound: resolve the surviving txs again.
fn purge_reorg(
    snapshot: &MempoolSnapshot,
    store: &dyn ChainStore,
    result: &mut PurgeResult,
) -> MempoolSnapshot {
    let mut survivors: Vec<ParsedTx> = snapshot
        .iter()
        .filter(|(key, _)| !result.mined.contains_key(key))
        .map(|(_, tx)| {
            let mut tx = (**tx).clone();
            tx.reset_resolution();
            tx
        })
        .collect();

    let empty = MempoolSnapshot::default();
    resolve_batch(&mut survivors, &empty, store);

    let mut builder = SnapshotBuilder::from_snapshot(&empty);
    for tx in survivors {
        if tx.state == ParsedTxState::Resolved {
            builder.insert(tx);
        } else {
            result.invalidated.insert(tx.key);
        }
    }
    let mut next = builder.build();
    next.set_version(snapshot.version() + 1);
    next
}
