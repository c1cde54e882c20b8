//! # Wallet Groups
//!
//! A group holds wallets of one kind (wallets or lockboxes) and the merged,
//! paged history over them. The group's pager lock is taken only for the
//! cache check and for the merge itself; per-wallet scans run outside it.

use super::entities::GroupKind;
use super::errors::ViewError;
use super::ledger::ledger_entries;
use super::lookup::Lookup;
use super::pager::HistoryPager;
use parking_lot::{Mutex, RwLock};
use shared_types::entities::ScrAddr;
use shared_types::ledger::LedgerEntry;
use std::collections::{BTreeMap, BTreeSet};

/// One tracked wallet: an id and its address set. Registration is
/// additive only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wallet {
    id: String,
    addresses: BTreeSet<ScrAddr>,
}

impl Wallet {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            addresses: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn addresses(&self) -> &BTreeSet<ScrAddr> {
        &self.addresses
    }

    #[must_use]
    pub fn contains(&self, addr: &ScrAddr) -> bool {
        self.addresses.contains(addr)
    }

    /// Add addresses; returns those not already present.
    pub fn add(&mut self, addrs: impl IntoIterator<Item = ScrAddr>) -> Vec<ScrAddr> {
        addrs.into_iter().filter(|a| self.addresses.insert(*a)).collect()
    }
}

pub struct WalletGroup {
    kind: GroupKind,
    wallets: RwLock<BTreeMap<String, Wallet>>,
    /// Wallets included in the merged history; `None` means all.
    filter: RwLock<Option<BTreeSet<String>>>,
    pager: Mutex<HistoryPager>,
}

impl WalletGroup {
    pub fn new(kind: GroupKind, page_size: usize) -> Self {
        Self {
            kind,
            wallets: RwLock::new(BTreeMap::new()),
            filter: RwLock::new(None),
            pager: Mutex::new(HistoryPager::new(page_size)),
        }
    }

    #[must_use]
    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    #[must_use]
    pub fn wallet(&self, id: &str) -> Option<Wallet> {
        self.wallets.read().get(id).cloned()
    }

    #[must_use]
    pub fn contains_wallet(&self, id: &str) -> bool {
        self.wallets.read().contains_key(id)
    }

    #[must_use]
    pub fn wallet_ids(&self) -> Vec<String> {
        self.wallets.read().keys().cloned().collect()
    }

    /// Create the wallet if needed.
    pub fn ensure_wallet(&self, id: &str) {
        self.wallets
            .write()
            .entry(id.to_string())
            .or_insert_with(|| Wallet::new(id));
    }

    /// Add addresses to a wallet, creating it if needed. Returns the
    /// addresses that were new to that wallet.
    pub fn add_addresses(&self, id: &str, addrs: impl IntoIterator<Item = ScrAddr>) -> Vec<ScrAddr> {
        let added = self
            .wallets
            .write()
            .entry(id.to_string())
            .or_insert_with(|| Wallet::new(id))
            .add(addrs);
        if !added.is_empty() {
            self.pager.lock().invalidate();
        }
        added
    }

    /// Addresses `addrs` not yet in wallet `id`.
    #[must_use]
    pub fn missing_addresses(&self, id: &str, addrs: &[ScrAddr]) -> Vec<ScrAddr> {
        let wallets = self.wallets.read();
        let known = wallets.get(id).map(Wallet::addresses);
        let mut seen = BTreeSet::new();
        addrs
            .iter()
            .filter(|a| known.map_or(true, |k| !k.contains(*a)) && seen.insert(**a))
            .copied()
            .collect()
    }

    /// Union of every wallet's addresses.
    #[must_use]
    pub fn addresses(&self) -> BTreeSet<ScrAddr> {
        self.wallets
            .read()
            .values()
            .flat_map(|w| w.addresses().iter().copied())
            .collect()
    }

    /// Any wallet tracks any of `addrs`.
    #[must_use]
    pub fn has_overlap(&self, addrs: &[ScrAddr]) -> bool {
        let wallets = self.wallets.read();
        addrs
            .iter()
            .any(|a| wallets.values().any(|w| w.contains(a)))
    }

    /// Drop cached pages.
    pub fn invalidate(&self) {
        self.pager.lock().invalidate();
    }

    /// Keep cached pages across a scan that did not touch this group.
    pub fn carry_forward(&self, from: u64, to: u64) {
        self.pager.lock().restamp(from, to);
    }

    /// Restrict the merged history to `ids`; `None` clears the filter.
    pub fn set_filter(&self, ids: Option<BTreeSet<String>>) -> Result<(), ViewError> {
        if let Some(ids) = &ids {
            let wallets = self.wallets.read();
            if let Some(unknown) = ids.iter().find(|id| !wallets.contains_key(*id)) {
                return Err(ViewError::not_found("wallet", unknown.clone()));
            }
        }
        *self.filter.write() = ids;
        self.pager.lock().invalidate();
        Ok(())
    }

    fn selected(&self) -> Vec<Wallet> {
        let filter = self.filter.read();
        self.wallets
            .read()
            .values()
            .filter(|w| filter.as_ref().map_or(true, |ids| ids.contains(w.id())))
            .cloned()
            .collect()
    }

    fn scan(wallets: &[Wallet], lookup: &Lookup<'_>) -> Vec<Vec<LedgerEntry>> {
        wallets
            .iter()
            .map(|w| ledger_entries(w.id(), w.addresses(), lookup))
            .collect()
    }

    /// Make sure the pager holds the merge for `update_id`, then run `read`
    /// against it.
    fn with_pager<T>(
        &self,
        update_id: u64,
        rebuild: bool,
        lookup: &Lookup<'_>,
        read: impl FnOnce(&HistoryPager) -> T,
    ) -> T {
        if !rebuild {
            let pager = self.pager.lock();
            if pager.is_current(update_id) {
                return read(&pager);
            }
        }
        let histories = Self::scan(&self.selected(), lookup);
        let mut pager = self.pager.lock();
        pager.merge(update_id, histories);
        read(&pager)
    }

    /// Page `page_id` of the merged history.
    pub fn history_page(
        &self,
        page_id: usize,
        update_id: u64,
        rebuild: bool,
        lookup: &Lookup<'_>,
    ) -> Result<Vec<LedgerEntry>, ViewError> {
        self.with_pager(update_id, rebuild, lookup, |pager| pager.page(page_id))
    }

    #[must_use]
    pub fn page_count(&self, update_id: u64, lookup: &Lookup<'_>) -> usize {
        self.with_pager(update_id, false, lookup, HistoryPager::page_count)
    }

    /// Merged history of `ids` regardless of the filter, newest first.
    pub fn history_for(&self, ids: &[String], lookup: &Lookup<'_>) -> Result<Vec<LedgerEntry>, ViewError> {
        let wallets = {
            let all = self.wallets.read();
            ids.iter()
                .map(|id| {
                    all.get(id)
                        .cloned()
                        .ok_or_else(|| ViewError::not_found("wallet", id.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        let mut scratch = HistoryPager::new(usize::MAX);
        scratch.merge(0, Self::scan(&wallets, lookup));
        Ok(scratch.entries().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lookup::TxMetaCache;
    use bv_01_zero_conf::MempoolSnapshot;
    use shared_types::memory::InMemoryChainStore;
    use shared_types::tx::TxBuilder;

    fn script(tag: u8) -> Vec<u8> {
        let mut s = vec![0x76, 0xa9, 0x14];
        s.extend_from_slice(&[tag; 20]);
        s.extend_from_slice(&[0x88, 0xac]);
        s
    }

    fn addr(tag: u8) -> ScrAddr {
        ScrAddr::from_script(&script(tag))
    }

    fn funded_store() -> InMemoryChainStore {
        let store = InMemoryChainStore::new();
        for tag in 1..=3u8 {
            let cb = TxBuilder::new()
                .coinbase(u32::from(tag))
                .pay(script(tag), 1_000 * u64::from(tag))
                .build();
            store.push_block(vec![cb], u32::from(tag) * 10);
        }
        store
    }

    #[test]
    fn test_wallet_add_is_additive() {
        let mut wallet = Wallet::new("w1");
        assert_eq!(wallet.add([addr(1), addr(2)]).len(), 2);
        assert_eq!(wallet.add([addr(2), addr(3)]), vec![addr(3)]);
        assert_eq!(wallet.addresses().len(), 3);
    }

    #[test]
    fn test_missing_addresses_dedupes() {
        let group = WalletGroup::new(GroupKind::Wallets, 100);
        group.add_addresses("w1", [addr(1)]);
        let missing = group.missing_addresses("w1", &[addr(1), addr(2), addr(2)]);
        assert_eq!(missing, vec![addr(2)]);
        assert_eq!(group.missing_addresses("w2", &[addr(1)]), vec![addr(1)]);
    }

    #[test]
    fn test_cached_page_and_rebuild_match() {
        let store = funded_store();
        let snapshot = MempoolSnapshot::default();
        let cache = TxMetaCache::new(16);
        let lookup = Lookup::new(&store, &snapshot, &cache);

        let group = WalletGroup::new(GroupKind::Wallets, 100);
        group.add_addresses("w1", [addr(1), addr(2)]);
        group.add_addresses("w2", [addr(3)]);

        let first = group.history_page(0, 1, false, &lookup).unwrap();
        assert_eq!(first.len(), 3);
        let cached = group.history_page(0, 1, false, &lookup).unwrap();
        let rebuilt = group.history_page(0, 1, true, &lookup).unwrap();
        assert_eq!(first, cached);
        assert_eq!(first, rebuilt);
        assert_eq!(group.page_count(1, &lookup), 1);
    }

    #[test]
    fn test_filter_restricts_history() {
        let store = funded_store();
        let snapshot = MempoolSnapshot::default();
        let cache = TxMetaCache::new(16);
        let lookup = Lookup::new(&store, &snapshot, &cache);

        let group = WalletGroup::new(GroupKind::Wallets, 100);
        group.add_addresses("w1", [addr(1)]);
        group.add_addresses("w2", [addr(2), addr(3)]);
        group
            .set_filter(Some(["w2".to_string()].into_iter().collect()))
            .unwrap();
        let page = group.history_page(0, 1, false, &lookup).unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|e| e.id == "w2"));

        let err = group
            .set_filter(Some(["nope".to_string()].into_iter().collect()))
            .unwrap_err();
        assert!(matches!(err, ViewError::NotFound { .. }));
    }

    #[test]
    fn test_history_for_unknown_wallet() {
        let store = funded_store();
        let snapshot = MempoolSnapshot::default();
        let cache = TxMetaCache::new(16);
        let lookup = Lookup::new(&store, &snapshot, &cache);
        let group = WalletGroup::new(GroupKind::Wallets, 100);
        group.add_addresses("w1", [addr(1)]);

        assert_eq!(group.history_for(&["w1".to_string()], &lookup).unwrap().len(), 1);
        assert!(group.history_for(&["w9".to_string()], &lookup).is_err());
    }

    #[test]
    fn test_overlap() {
        let group = WalletGroup::new(GroupKind::Lockboxes, 100);
        group.add_addresses("lb", [addr(1)]);
        assert!(group.has_overlap(&[addr(2), addr(1)]));
        assert!(!group.has_overlap(&[addr(2)]));
    }
}
