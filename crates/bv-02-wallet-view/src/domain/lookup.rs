//! # Lookup
//!
//! Read access to confirmed and zero-conf state through one interface.
//! A `Lookup` pins one mempool snapshot for its whole lifetime, so every
//! answer computed through it is consistent with a single mempool version.
//!
//! Zero-conf state takes precedence for spentness: a confirmed output
//! spent by a pooled transaction is reported spent.

use bv_01_zero_conf::domain::ParsedTxOut;
use bv_01_zero_conf::MempoolSnapshot;
use lru::LruCache;
use parking_lot::Mutex;
use shared_types::entities::{Hash, OutPoint, ScrAddr, Utxo};
use shared_types::keys::{OutputKey, TxKey};
use shared_types::ports::ChainStore;
use shared_types::tx::Transaction;
use shared_types::txio::TxIoPair;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// What a ledger entry needs to know about a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxMeta {
    pub hash: Hash,
    pub tx_time: u32,
    pub outputs: Vec<ParsedTxOut>,
    pub is_rbf: bool,
    pub is_chained: bool,
}

/// LRU cache of confirmed transaction metadata.
///
/// Only confirmed keys are cached; zero-conf metadata is read straight
/// from the snapshot.
pub struct TxMetaCache {
    inner: Mutex<LruCache<TxKey, Arc<TxMeta>>>,
}

impl TxMetaCache {
    pub fn new(capacity: usize) -> Self {
        const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
            Some(n) => n,
            None => unreachable!(),
        };
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn get(&self, key: &TxKey) -> Option<Arc<TxMeta>> {
        self.inner.lock().get(key).cloned()
    }

    fn put(&self, key: TxKey, meta: Arc<TxMeta>) {
        self.inner.lock().put(key, meta);
    }

    /// Forget every block at or above `height`; those keys may now name
    /// different transactions.
    pub fn evict_from(&self, height: u32) {
        let mut cache = self.inner.lock();
        let stale: Vec<TxKey> = cache
            .iter()
            .map(|(key, _)| *key)
            .filter(|key| key.height() >= height)
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Chain store plus one pinned mempool snapshot.
pub struct Lookup<'a> {
    store: &'a dyn ChainStore,
    snapshot: &'a MempoolSnapshot,
    cache: &'a TxMetaCache,
}

impl<'a> Lookup<'a> {
    pub fn new(store: &'a dyn ChainStore, snapshot: &'a MempoolSnapshot, cache: &'a TxMetaCache) -> Self {
        Self {
            store,
            snapshot,
            cache,
        }
    }

    #[must_use]
    pub fn store(&self) -> &'a dyn ChainStore {
        self.store
    }

    #[must_use]
    pub fn snapshot(&self) -> &'a MempoolSnapshot {
        self.snapshot
    }

    /// Top block height, `None` on an empty chain.
    #[must_use]
    pub fn top_height(&self) -> Option<u32> {
        self.store.top_header().map(|h| h.height)
    }

    /// Every TxIO pair of `addr`, confirmed and zero-conf, by output key.
    #[must_use]
    pub fn address_txios(&self, addr: &ScrAddr) -> BTreeMap<OutputKey, TxIoPair> {
        let mut pairs: BTreeMap<OutputKey, TxIoPair> = match self.top_height() {
            Some(top) => self
                .store
                .address_history(addr, 0, top)
                .into_iter()
                .map(|pair| (pair.output, pair))
                .collect(),
            None => BTreeMap::new(),
        };
        if let Some(zc) = self.snapshot.txios_for(addr) {
            for (key, pair) in zc.iter() {
                match pairs.get_mut(key) {
                    Some(existing) => {
                        if let Some(spender) = pair.spender {
                            existing.apply_spend(spender);
                        }
                    }
                    None => {
                        pairs.insert(*key, *pair);
                    }
                }
            }
        }
        pairs
    }

    /// Metadata of a confirmed or zero-conf transaction.
    #[must_use]
    pub fn tx_meta(&self, key: &TxKey) -> Option<Arc<TxMeta>> {
        if key.is_zero_conf() {
            let tx = self.snapshot.tx(key)?;
            return Some(Arc::new(TxMeta {
                hash: tx.hash,
                tx_time: tx.tx_time,
                outputs: tx.outputs.clone(),
                is_rbf: tx.is_rbf,
                is_chained: tx.is_chained,
            }));
        }
        if let Some(meta) = self.cache.get(key) {
            return Some(meta);
        }

        let hash = self.store.tx_hash_for_key(key)?;
        let stored = self.store.tx_by_hash(&hash)?;
        let tx = match Transaction::parse(&stored.raw) {
            Ok(tx) => tx,
            Err(e) => {
                debug!(tx_key = %key, error = %e, "Stored transaction does not parse");
                return None;
            }
        };
        let meta = Arc::new(TxMeta {
            hash,
            tx_time: stored.tx_time,
            outputs: tx
                .outputs
                .iter()
                .map(|out| ParsedTxOut {
                    scr_addr: out.scr_addr(),
                    value: out.value,
                    script: out.script.clone(),
                })
                .collect(),
            is_rbf: false,
            is_chained: false,
        });
        self.cache.put(*key, Arc::clone(&meta));
        Some(meta)
    }

    /// The output behind a funding leg, as handed to clients.
    #[must_use]
    pub fn utxo(&self, pair: &TxIoPair) -> Option<Utxo> {
        let key = pair.funding_key();
        let meta = self.tx_meta(&key)?;
        let index = pair.output.index();
        let out = meta.outputs.get(index as usize)?;
        Some(Utxo {
            tx_hash: meta.hash,
            tx_out_index: index,
            value: pair.value,
            height: key.height(),
            tx_index: key.tx_index(),
            script: out.script.clone(),
        })
    }

    /// Hash of any transaction, confirmed or pooled.
    #[must_use]
    pub fn tx_hash(&self, key: &TxKey) -> Option<Hash> {
        if key.is_zero_conf() {
            return self.snapshot.tx(key).map(|tx| tx.hash);
        }
        self.store.tx_hash_for_key(key)
    }

    /// Spending transaction of `outpoint`, zero-conf first.
    #[must_use]
    pub fn spender_of(&self, outpoint: &OutPoint) -> Option<TxKey> {
        self.snapshot
            .spender_of(outpoint)
            .or_else(|| self.store.output(outpoint).and_then(|out| out.spender))
    }
}
