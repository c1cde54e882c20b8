//! # Mempool Snapshot
//!
//! An immutable view of every resolved zero-conf transaction. Readers hold
//! an `Arc<MempoolSnapshot>` for as long as they like; the engine builds the
//! next version with a `SnapshotBuilder` and swaps it in whole.
//!
//! ## Indexes
//!
//! | Index | Maps | Used by |
//! |-------|------|---------|
//! | `hash_to_key` | tx hash → zero-conf key | dedup, parent lookup |
//! | `txs` | key → parsed tx | everything |
//! | `spent` | outpoint → spending zero-conf key | replacement detection |
//! | `txios` | address → output key → TxIO | wallet views |
//!
//! Per-address TxIO maps sit behind their own `Arc` so a new version only
//! copies the maps of the addresses it touched.

use super::entities::{ParsedTx, ResolvedInput};
use shared_types::entities::{Hash, OutPoint, ScrAddr};
use shared_types::keys::{OutputKey, TxKey};
use shared_types::txio::TxIoPair;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// TxIO pairs of one address, keyed by funded output.
pub type AddressTxios = BTreeMap<OutputKey, TxIoPair>;

/// Outcome of looking an outpoint up among zero-conf transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZcOutput {
    /// The funding tx is pooled and has this output.
    Found(ResolvedInput),
    /// The funding tx is pooled but has no output at that index.
    OutOfRange,
    /// No pooled tx with that hash.
    Unknown,
}

/// Immutable mempool state, shared by readers.
#[derive(Debug, Clone, Default)]
pub struct MempoolSnapshot {
    version: u64,
    hash_to_key: HashMap<Hash, TxKey>,
    txs: BTreeMap<TxKey, Arc<ParsedTx>>,
    spent: HashMap<OutPoint, TxKey>,
    txios: HashMap<ScrAddr, Arc<AddressTxios>>,
}

impl MempoolSnapshot {
    /// Monotonic version, bumped on every published change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    #[must_use]
    pub fn key_for_hash(&self, hash: &Hash) -> Option<TxKey> {
        self.hash_to_key.get(hash).copied()
    }

    #[must_use]
    pub fn tx(&self, key: &TxKey) -> Option<&Arc<ParsedTx>> {
        self.txs.get(key)
    }

    #[must_use]
    pub fn tx_by_hash(&self, hash: &Hash) -> Option<&Arc<ParsedTx>> {
        self.hash_to_key.get(hash).and_then(|key| self.txs.get(key))
    }

    /// Zero-conf transaction spending `outpoint`, if any.
    #[must_use]
    pub fn spender_of(&self, outpoint: &OutPoint) -> Option<TxKey> {
        self.spent.get(outpoint).copied()
    }

    /// Zero-conf TxIO pairs touching `addr`.
    #[must_use]
    pub fn txios_for(&self, addr: &ScrAddr) -> Option<Arc<AddressTxios>> {
        self.txios.get(addr).cloned()
    }

    #[must_use]
    pub fn has_address(&self, addr: &ScrAddr) -> bool {
        self.txios.contains_key(addr)
    }

    /// Transactions in key order, i.e. arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&TxKey, &Arc<ParsedTx>)> {
        self.txs.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TxKey> {
        self.txs.keys()
    }

    /// Every address with zero-conf activity.
    pub fn addresses(&self) -> impl Iterator<Item = &ScrAddr> {
        self.txios.keys()
    }

    /// Look an outpoint up among pooled transactions.
    #[must_use]
    pub fn output(&self, outpoint: &OutPoint) -> ZcOutput {
        let Some(tx) = self.tx_by_hash(&outpoint.hash) else {
            return ZcOutput::Unknown;
        };
        match tx.outputs.get(outpoint.index as usize) {
            Some(out) => ZcOutput::Found(ResolvedInput {
                output_key: tx.key.output(outpoint.index),
                scr_addr: out.scr_addr,
                value: out.value,
            }),
            None => ZcOutput::OutOfRange,
        }
    }

    /// Cross-check the indexes against each other: every hash maps to a
    /// pooled tx, every spend claim belongs to a pooled tx that has that
    /// input, and every zero-conf funding leg belongs to a pooled tx.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let hashes_ok = self.hash_to_key.len() == self.txs.len()
            && self
                .hash_to_key
                .iter()
                .all(|(hash, key)| self.txs.get(key).is_some_and(|tx| tx.hash == *hash));
        let spends_ok = self.spent.iter().all(|(outpoint, key)| {
            self.txs
                .get(key)
                .is_some_and(|tx| tx.inputs.iter().any(|i| i.outpoint == *outpoint))
        });
        let txios_ok = self.txios.values().all(|map| {
            map.values().all(|pair| {
                (!pair.is_zc_funding() || self.txs.contains_key(&pair.funding_key()))
                    && pair
                        .spender
                        .map_or(true, |s| !s.is_zero_conf() || self.txs.contains_key(&s))
            })
        });
        hashes_ok && spends_ok && txios_ok
    }

    /// Pooled transactions spending an output of `key`.
    #[must_use]
    pub fn children_of(&self, key: &TxKey) -> Vec<TxKey> {
        let Some(tx) = self.txs.get(key) else {
            return Vec::new();
        };
        let mut children: Vec<TxKey> = (0..tx.outputs.len() as u32)
            .filter_map(|index| self.spent.get(&OutPoint::new(tx.hash, index)).copied())
            .collect();
        children.sort_unstable();
        children.dedup();
        children
    }

    /// Every pooled transaction descending from `key`, excluding `key`.
    #[must_use]
    pub fn descendants(&self, key: &TxKey) -> Vec<TxKey> {
        let mut seen = Vec::new();
        let mut queue: VecDeque<TxKey> = self.children_of(key).into();
        while let Some(next) = queue.pop_front() {
            if seen.contains(&next) {
                continue;
            }
            queue.extend(self.children_of(&next));
            seen.push(next);
        }
        seen
    }
}

/// Builds the next snapshot version from the current one.
#[derive(Debug)]
pub struct SnapshotBuilder {
    next: MempoolSnapshot,
}

impl SnapshotBuilder {
    /// Start from `base`; `base` itself is never modified.
    #[must_use]
    pub fn from_snapshot(base: &MempoolSnapshot) -> Self {
        Self { next: base.clone() }
    }

    /// The state built so far.
    #[must_use]
    pub fn view(&self) -> &MempoolSnapshot {
        &self.next
    }

    /// Add a resolved transaction, indexing its spends and TxIOs.
    ///
    /// A spend of an outpoint already claimed by another pooled tx simply
    /// overwrites the claim; callers evict the loser first.
    pub fn insert(&mut self, tx: ParsedTx) {
        let key = tx.key;
        for input in &tx.inputs {
            if input.resolved.is_some() {
                self.next.spent.insert(input.outpoint, key);
            }
        }
        for (addr, pair) in tx.txios() {
            let map = Arc::make_mut(self.next.txios.entry(addr).or_default());
            match map.get_mut(&pair.output) {
                Some(existing) if pair.spender.is_some() => existing.spender = pair.spender,
                Some(existing) => {
                    let spender = existing.spender;
                    *existing = TxIoPair { spender, ..pair };
                }
                None => {
                    map.insert(pair.output, pair);
                }
            }
        }
        self.next.hash_to_key.insert(tx.hash, key);
        self.next.txs.insert(key, Arc::new(tx));
    }

    /// Drop a transaction and every index entry it contributed.
    pub fn remove(&mut self, key: &TxKey) -> Option<Arc<ParsedTx>> {
        let tx = self.next.txs.remove(key)?;
        self.next.hash_to_key.remove(&tx.hash);

        for input in &tx.inputs {
            let Some(resolved) = input.resolved else {
                continue;
            };
            if self.next.spent.get(&input.outpoint) == Some(key) {
                self.next.spent.remove(&input.outpoint);
            }
            self.edit_address(&resolved.scr_addr, |map| {
                if resolved.output_key.is_zero_conf() {
                    if let Some(pair) = map.get_mut(&resolved.output_key) {
                        if pair.spender == Some(*key) {
                            pair.spender = None;
                        }
                    }
                } else if map
                    .get(&resolved.output_key)
                    .is_some_and(|pair| pair.spender == Some(*key))
                {
                    map.remove(&resolved.output_key);
                }
            });
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            let out_key = key.output(index as u32);
            self.edit_address(&output.scr_addr, |map| {
                map.remove(&out_key);
            });
        }
        Some(tx)
    }

    /// Remove `key` and every descendant. Returns the removed transactions.
    pub fn remove_with_descendants(&mut self, key: &TxKey) -> Vec<Arc<ParsedTx>> {
        let mut doomed = vec![*key];
        doomed.extend(self.next.descendants(key));
        doomed.iter().filter_map(|k| self.remove(k)).collect()
    }

    /// Seal the next version.
    #[must_use]
    pub fn build(mut self) -> MempoolSnapshot {
        self.next.version += 1;
        self.next
    }

    fn edit_address(&mut self, addr: &ScrAddr, edit: impl FnOnce(&mut AddressTxios)) {
        let Some(entry) = self.next.txios.get_mut(addr) else {
            return;
        };
        let map = Arc::make_mut(entry);
        edit(map);
        if map.is_empty() {
            self.next.txios.remove(addr);
        }
    }
}
