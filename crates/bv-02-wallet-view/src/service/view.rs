//! # Wallet View
//!
//! One view per session. Composes the chain store, the current mempool
//! snapshot and the session's wallet groups to answer queries, and tracks
//! the scan id (`update_id`) that invalidates cached history pages.

use super::address_filter::AddressFilter;
use crate::domain::{
    address_book, balances, ledger_entries, tx_keys, AddressBookEntry, Balances, BalancesAndCount,
    DelegateTarget, GroupKind, HistoryPager, Lookup, ScanNotification, Spentness, TxInfo,
    TxMetaCache, ViewConfig, ViewError, Wallet, WalletGroup,
};
use crate::ports::{ChainStore, EventPublisher, NodeFeed, WalletViewApi, ZeroConfApi};
use async_trait::async_trait;
use bv_01_zero_conf::ZcOutput;
use dashmap::DashMap;
use parking_lot::Mutex;
use shared_bus::{IndexerEvent, RefreshType};
use shared_types::entities::{hash_to_hex, Hash, OutPoint, ScrAddr, Utxo, ZERO_HASH};
use shared_types::keys::{TxKey, UNCONFIRMED_HEIGHT};
use shared_types::ledger::{newest_first, LedgerEntry};
use shared_types::ports::{FeeEstimate, NodeStatus};
use shared_types::txio::TxIoPair;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Node-wide collaborators shared by every view.
#[derive(Clone)]
pub struct ViewContext {
    pub store: Arc<dyn ChainStore>,
    pub feed: Arc<dyn NodeFeed>,
    pub zero_conf: Arc<dyn ZeroConfApi>,
    pub publisher: Arc<dyn EventPublisher>,
    pub filter: Arc<AddressFilter>,
}

enum Delegate {
    Group(GroupKind),
    Address {
        addr: ScrAddr,
        pager: Mutex<HistoryPager>,
    },
}

struct ViewInner {
    session_id: String,
    config: ViewConfig,
    ctx: ViewContext,
    wallets: WalletGroup,
    lockboxes: WalletGroup,
    delegates: DashMap<String, Arc<Delegate>>,
    tx_cache: TxMetaCache,
    /// Registration ids already acknowledged.
    completed: Mutex<HashSet<String>>,
    /// Outstanding registrations.
    registrations: watch::Sender<usize>,
    ready: AtomicBool,
    update_id: AtomicU64,
    top_height: AtomicU32,
}

/// A session's wallet view. Cheap to clone.
#[derive(Clone)]
pub struct WalletView {
    inner: Arc<ViewInner>,
}

impl WalletView {
    pub fn new(session_id: impl Into<String>, config: ViewConfig, ctx: ViewContext) -> Self {
        let (registrations, _) = watch::channel(0usize);
        let inner = ViewInner {
            session_id: session_id.into(),
            wallets: WalletGroup::new(GroupKind::Wallets, config.page_size),
            lockboxes: WalletGroup::new(GroupKind::Lockboxes, config.page_size),
            tx_cache: TxMetaCache::new(config.tx_cache_size),
            config,
            ctx,
            delegates: DashMap::new(),
            completed: Mutex::new(HashSet::new()),
            registrations,
            ready: AtomicBool::new(false),
            update_id: AtomicU64::new(0),
            top_height: AtomicU32::new(0),
        };
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl ViewInner {
    fn group(&self, kind: GroupKind) -> &WalletGroup {
        match kind {
            GroupKind::Wallets => &self.wallets,
            GroupKind::Lockboxes => &self.lockboxes,
        }
    }

    fn groups(&self) -> [&WalletGroup; 2] {
        [&self.wallets, &self.lockboxes]
    }

    fn ensure_ready(&self) -> Result<(), ViewError> {
        if self.ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ViewError::NotReady)
        }
    }

    fn find_wallet(&self, id: &str) -> Result<Wallet, ViewError> {
        self.ensure_ready()?;
        self.wallets
            .wallet(id)
            .or_else(|| self.lockboxes.wallet(id))
            .ok_or_else(|| ViewError::not_found("wallet", id))
    }

    /// Run `f` against the chain and one pinned mempool snapshot.
    fn with_lookup<T>(&self, f: impl FnOnce(&Lookup<'_>) -> T) -> T {
        let snapshot = self.ctx.zero_conf.snapshot();
        let lookup = Lookup::new(self.ctx.store.as_ref(), &snapshot, &self.tx_cache);
        f(&lookup)
    }

    fn wallet_pairs(wallet: &Wallet, lookup: &Lookup<'_>) -> Vec<TxIoPair> {
        wallet
            .addresses()
            .iter()
            .flat_map(|addr| lookup.address_txios(addr).into_values())
            .collect()
    }

    fn wallet_utxos(
        &self,
        wallet_id: &str,
        keep: impl Fn(&TxIoPair) -> bool,
    ) -> Result<Vec<Utxo>, ViewError> {
        let wallet = self.find_wallet(wallet_id)?;
        Ok(self.with_lookup(|lookup| {
            Self::wallet_pairs(&wallet, lookup)
                .into_iter()
                .filter(|pair| keep(pair))
                .filter_map(|pair| lookup.utxo(&pair))
                .collect()
        }))
    }

    fn refresh_top(&self) -> u32 {
        let height = self.ctx.store.top_header().map_or(0, |h| h.height);
        self.top_height.store(height, Ordering::Release);
        height
    }

    /// Addresses of `group` with confirmed activity from `from` upward.
    fn touched_since(&self, group: &WalletGroup, from: u32, to: u32) -> bool {
        group
            .addresses()
            .iter()
            .any(|addr| !self.ctx.store.address_history(addr, from, to).is_empty())
    }

    fn scan(&self, notification: &ScanNotification) -> bool {
        let top = self.refresh_top();
        let affected: Vec<GroupKind> = match notification {
            ScanNotification::Init | ScanNotification::Refresh => {
                vec![GroupKind::Wallets, GroupKind::Lockboxes]
            }
            ScanNotification::NewBlock {
                scan_from,
                invalidated_zc,
            } => {
                self.tx_cache.evict_from(*scan_from);
                self.groups()
                    .into_iter()
                    .filter(|g| !invalidated_zc.is_empty() || self.touched_since(g, *scan_from, top))
                    .map(WalletGroup::kind)
                    .collect()
            }
            ScanNotification::ZeroConf {
                addresses,
                invalidated,
            } => self
                .groups()
                .into_iter()
                .filter(|g| !invalidated.is_empty() || g.has_overlap(addresses))
                .map(WalletGroup::kind)
                .collect(),
        };

        let touched = !affected.is_empty();
        let previous = self.update_id.load(Ordering::Acquire);
        let current = if touched {
            self.update_id.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            previous
        };
        for group in self.groups() {
            if affected.contains(&group.kind()) {
                group.invalidate();
            } else {
                group.carry_forward(previous, current);
            }
        }
        for entry in self.delegates.iter() {
            if let Delegate::Address { addr, pager } = entry.value().as_ref() {
                let hit = match notification {
                    ScanNotification::ZeroConf { addresses, invalidated } => {
                        !invalidated.is_empty() || addresses.contains(addr)
                    }
                    _ => true,
                };
                if hit {
                    pager.lock().invalidate();
                } else {
                    pager.lock().restamp(previous, current);
                }
            }
        }

        debug!(
            session_id = %self.session_id,
            update_id = current,
            touched,
            "Wallets scanned"
        );
        touched
    }

    async fn acknowledge(&self, registration_id: &str) {
        if registration_id.is_empty() {
            return;
        }
        if !self.completed.lock().insert(registration_id.to_string()) {
            debug!(session_id = %self.session_id, registration_id, "Registration already acknowledged");
            return;
        }
        self.ctx
            .publisher
            .publish(IndexerEvent::Refresh {
                session_id: self.session_id.clone(),
                refresh_type: RefreshType::Registration,
                ids: vec![registration_id.to_string()],
            })
            .await;
    }

    /// Apply a registration whose addresses are now watched.
    async fn finish_registration(
        &self,
        kind: GroupKind,
        wallet_id: &str,
        addrs: Vec<ScrAddr>,
        is_new: bool,
        registration_id: &str,
    ) {
        let added = self.group(kind).add_addresses(wallet_id, addrs);
        self.update_id.fetch_add(1, Ordering::AcqRel);

        // zero-conf activity that arrived before the filter knew these addresses
        let snapshot = self.ctx.zero_conf.snapshot();
        let touched: Vec<ScrAddr> = added
            .iter()
            .filter(|addr| snapshot.has_address(addr))
            .copied()
            .collect();
        if !touched.is_empty() {
            let new_keys: BTreeSet<TxKey> = touched
                .iter()
                .filter_map(|addr| snapshot.txios_for(addr))
                .flat_map(|txios| tx_keys(txios.values()))
                .filter(TxKey::is_zero_conf)
                .collect();
            debug!(
                session_id = %self.session_id,
                wallet_id,
                zc = new_keys.len(),
                "Folding zero-conf activity into new registration"
            );
            self.ctx
                .publisher
                .publish(IndexerEvent::ZeroConf {
                    session_id: self.session_id.clone(),
                    new_keys: new_keys.into_iter().collect(),
                    invalidated: Vec::new(),
                    addresses: touched,
                })
                .await;
        }

        self.registrations.send_modify(|n| *n = n.saturating_sub(1));
        info!(
            session_id = %self.session_id,
            wallet_id,
            group = kind.as_str(),
            added = added.len(),
            is_new,
            "Addresses registered"
        );
        self.acknowledge(registration_id).await;
    }

    fn register(
        self: &Arc<Self>,
        kind: GroupKind,
        wallet_id: &str,
        addrs: Vec<ScrAddr>,
        is_new: bool,
        registration_id: &str,
    ) -> Result<(), ViewError> {
        if wallet_id.is_empty() {
            return Err(ViewError::InvalidRequest("empty wallet id".into()));
        }
        let group = self.group(kind);
        let other = match kind {
            GroupKind::Wallets => &self.lockboxes,
            GroupKind::Lockboxes => &self.wallets,
        };
        if other.contains_wallet(wallet_id) {
            return Err(ViewError::InvalidRequest(format!(
                "id {wallet_id} is already registered as a {}",
                other.kind().as_str()
            )));
        }
        group.ensure_wallet(wallet_id);

        let missing = group.missing_addresses(wallet_id, &addrs);
        let inner = Arc::clone(self);
        let wallet_id = wallet_id.to_string();
        let registration_id = registration_id.to_string();
        if missing.is_empty() {
            tokio::spawn(async move { inner.acknowledge(&registration_id).await });
            return Ok(());
        }

        self.registrations.send_modify(|n| *n += 1);
        let done = self.ctx.filter.register(&self.session_id, missing.clone());
        tokio::spawn(async move {
            if done.await.is_err() {
                inner.registrations.send_modify(|n| *n = n.saturating_sub(1));
                return;
            }
            inner
                .finish_registration(kind, &wallet_id, missing, is_new, &registration_id)
                .await;
        });
        Ok(())
    }

    fn delegate(&self, id: &str) -> Result<Arc<Delegate>, ViewError> {
        self.ensure_ready()?;
        self.delegates
            .get(id)
            .map(|d| Arc::clone(d.value()))
            .ok_or_else(|| ViewError::not_found("ledger delegate", id))
    }

    fn address_pager<T>(
        &self,
        addr: &ScrAddr,
        pager: &Mutex<HistoryPager>,
        rebuild: bool,
        read: impl FnOnce(&HistoryPager) -> T,
    ) -> T {
        let update_id = self.update_id.load(Ordering::Acquire);
        if !rebuild {
            let cached = pager.lock();
            if cached.is_current(update_id) {
                return read(&cached);
            }
        }
        let addresses: BTreeSet<ScrAddr> = [*addr].into_iter().collect();
        let history = self.with_lookup(|lookup| ledger_entries(&addr.to_string(), &addresses, lookup));
        let mut pager = pager.lock();
        pager.merge(update_id, vec![history]);
        read(&pager)
    }
}

#[async_trait]
impl WalletViewApi for WalletView {
    fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    fn update_id(&self) -> u64 {
        self.inner.update_id.load(Ordering::Acquire)
    }

    async fn go_online(&self) -> Result<u32, ViewError> {
        let inner = &self.inner;
        inner.scan(&ScanNotification::Init);
        inner.ready.store(true, Ordering::Release);
        let height = inner.top_height.load(Ordering::Acquire);
        info!(session_id = %inner.session_id, height, "Wallet view online");
        inner
            .ctx
            .publisher
            .publish(IndexerEvent::Ready {
                session_id: inner.session_id.clone(),
                height,
            })
            .await;
        Ok(height)
    }

    fn scan_wallets(&self, notification: &ScanNotification) -> bool {
        self.inner.scan(notification)
    }

    fn register_addresses(
        &self,
        kind: GroupKind,
        wallet_id: &str,
        addrs: Vec<ScrAddr>,
        is_new: bool,
        registration_id: &str,
    ) -> Result<(), ViewError> {
        self.inner
            .register(kind, wallet_id, addrs, is_new, registration_id)
    }

    fn is_registering(&self) -> bool {
        *self.inner.registrations.borrow() > 0
    }

    async fn registrations_settled(&self) {
        let mut rx = self.inner.registrations.subscribe();
        let _ = rx.wait_for(|outstanding| *outstanding == 0).await;
    }

    fn close(&self) {
        let inner = &self.inner;
        inner.ready.store(false, Ordering::Release);
        inner.delegates.clear();
        inner.ctx.filter.release(&inner.session_id);
        debug!(session_id = %inner.session_id, "Wallet view closed");
    }

    fn ledger_delegate(&self, target: DelegateTarget) -> Result<String, ViewError> {
        let inner = &self.inner;
        inner.ensure_ready()?;
        let delegate = match target {
            DelegateTarget::Group(kind) => Delegate::Group(kind),
            DelegateTarget::Address(addr) => Delegate::Address {
                addr,
                pager: Mutex::new(HistoryPager::new(inner.config.page_size)),
            },
        };
        let id = uuid::Uuid::new_v4().to_string();
        inner.delegates.insert(id.clone(), Arc::new(delegate));
        Ok(id)
    }

    fn history_page(
        &self,
        delegate_id: &str,
        page_id: usize,
        rebuild: bool,
        remap: bool,
    ) -> Result<Vec<LedgerEntry>, ViewError> {
        let inner = &self.inner;
        let force = rebuild || remap;
        match inner.delegate(delegate_id)?.as_ref() {
            Delegate::Group(kind) => {
                let update_id = inner.update_id.load(Ordering::Acquire);
                inner.with_lookup(|lookup| {
                    inner.group(*kind).history_page(page_id, update_id, force, lookup)
                })
            }
            Delegate::Address { addr, pager } => {
                inner.address_pager(addr, pager, force, |p| p.page(page_id))
            }
        }
    }

    fn page_count(&self, delegate_id: &str) -> Result<usize, ViewError> {
        let inner = &self.inner;
        match inner.delegate(delegate_id)?.as_ref() {
            Delegate::Group(kind) => {
                let update_id = inner.update_id.load(Ordering::Acquire);
                Ok(inner.with_lookup(|lookup| inner.group(*kind).page_count(update_id, lookup)))
            }
            Delegate::Address { addr, pager } => {
                Ok(inner.address_pager(addr, pager, false, HistoryPager::page_count))
            }
        }
    }

    async fn update_wallets_ledger_filter(&self, ids: Vec<String>) -> Result<(), ViewError> {
        let inner = &self.inner;
        inner.ensure_ready()?;
        let filter = if ids.is_empty() {
            None
        } else {
            Some(ids.iter().cloned().collect())
        };
        inner.wallets.set_filter(filter)?;
        inner
            .ctx
            .publisher
            .publish(IndexerEvent::Refresh {
                session_id: inner.session_id.clone(),
                refresh_type: RefreshType::Filter,
                ids,
            })
            .await;
        Ok(())
    }

    fn history_for_wallet_selection(&self, ids: &[String]) -> Result<Vec<LedgerEntry>, ViewError> {
        let inner = &self.inner;
        inner.ensure_ready()?;
        inner.with_lookup(|lookup| inner.wallets.history_for(ids, lookup))
    }

    fn zero_conf_entries(&self, keys: &[TxKey]) -> Vec<LedgerEntry> {
        let inner = &self.inner;
        let wanted: BTreeSet<TxKey> = keys.iter().copied().collect();
        let mut entries: Vec<LedgerEntry> = inner.with_lookup(|lookup| {
            let snapshot = lookup.snapshot();
            let touched: Vec<ScrAddr> = wanted
                .iter()
                .filter_map(|key| snapshot.tx(key))
                .flat_map(|tx| tx.addresses())
                .collect();
            inner
                .groups()
                .into_iter()
                .filter(|g| g.has_overlap(&touched))
                .flat_map(|g| g.wallet_ids().into_iter().filter_map(|id| g.wallet(&id)))
                .filter(|w| touched.iter().any(|a| w.contains(a)))
                .flat_map(|w| ledger_entries(w.id(), w.addresses(), lookup))
                .filter(|e| wanted.contains(&e.tx_key))
                .collect()
        });
        entries.sort_by(newest_first);
        entries
    }

    fn balances_and_count(&self, wallet_id: &str) -> Result<BalancesAndCount, ViewError> {
        let wallet = self.inner.find_wallet(wallet_id)?;
        Ok(self.inner.with_lookup(|lookup| {
            let pairs = ViewInner::wallet_pairs(&wallet, lookup);
            BalancesAndCount {
                balances: balances(&pairs),
                tx_count: tx_keys(&pairs).len() as u64,
            }
        }))
    }

    fn addr_balances(&self, wallet_id: &str) -> Result<BTreeMap<ScrAddr, Balances>, ViewError> {
        let wallet = self.inner.find_wallet(wallet_id)?;
        Ok(self.inner.with_lookup(|lookup| {
            wallet
                .addresses()
                .iter()
                .map(|addr| (*addr, balances(lookup.address_txios(addr).values())))
                .collect()
        }))
    }

    fn addr_txn_counts(&self, wallet_id: &str) -> Result<BTreeMap<ScrAddr, u64>, ViewError> {
        let wallet = self.inner.find_wallet(wallet_id)?;
        Ok(self.inner.with_lookup(|lookup| {
            wallet
                .addresses()
                .iter()
                .map(|addr| (*addr, tx_keys(lookup.address_txios(addr).values()).len() as u64))
                .collect()
        }))
    }

    fn spendable_txouts_for_value(&self, wallet_id: &str, value: u64) -> Result<Vec<Utxo>, ViewError> {
        let mut utxos = self.inner.wallet_utxos(wallet_id, TxIoPair::is_spendable)?;
        utxos.sort_by(|a, b| a.height.cmp(&b.height).then(b.value.cmp(&a.value)));
        let mut covered = 0u64;
        let mut selected = Vec::new();
        for utxo in utxos {
            if covered >= value && !selected.is_empty() {
                break;
            }
            covered = covered.saturating_add(utxo.value);
            selected.push(utxo);
        }
        Ok(selected)
    }

    fn spendable_txouts_for_addr(&self, wallet_id: &str, addr: &ScrAddr) -> Result<Vec<Utxo>, ViewError> {
        let wallet = self.inner.find_wallet(wallet_id)?;
        if !wallet.contains(addr) {
            return Err(ViewError::not_found("address", addr.to_string()));
        }
        Ok(self.inner.with_lookup(|lookup| {
            lookup
                .address_txios(addr)
                .into_values()
                .filter(TxIoPair::is_spendable)
                .filter_map(|pair| lookup.utxo(&pair))
                .collect()
        }))
    }

    fn spendable_zc_list(&self, wallet_id: &str) -> Result<Vec<Utxo>, ViewError> {
        self.inner
            .wallet_utxos(wallet_id, TxIoPair::is_unconfirmed_unspent)
    }

    fn rbf_txout_list(&self, wallet_id: &str) -> Result<Vec<Utxo>, ViewError> {
        self.inner
            .wallet_utxos(wallet_id, |pair| pair.is_zc_funding() && pair.is_rbf)
    }

    fn utxos_for_addr_list(&self, addrs: &[ScrAddr]) -> Result<Vec<Utxo>, ViewError> {
        self.inner.ensure_ready()?;
        Ok(self.inner.with_lookup(|lookup| {
            addrs
                .iter()
                .flat_map(|addr| lookup.address_txios(addr).into_values())
                .filter(|pair| !pair.is_spent())
                .filter_map(|pair| lookup.utxo(&pair))
                .collect()
        }))
    }

    fn outpoint_spentness(&self, outpoints: &[OutPoint]) -> Result<Vec<Spentness>, ViewError> {
        self.inner.ensure_ready()?;
        Ok(self.inner.with_lookup(|lookup| {
            let snapshot = lookup.snapshot();
            outpoints
                .iter()
                .map(|op| {
                    if let Some(key) = snapshot.spender_of(op) {
                        return Spentness::Spent {
                            height: UNCONFIRMED_HEIGHT,
                            spender: lookup.tx_hash(&key).unwrap_or(ZERO_HASH),
                        };
                    }
                    match lookup.store().output(op) {
                        Some(out) => match out.spender {
                            Some(key) => Spentness::Spent {
                                height: key.height(),
                                spender: lookup.tx_hash(&key).unwrap_or(ZERO_HASH),
                            },
                            None => Spentness::Unspent,
                        },
                        None => match snapshot.output(op) {
                            ZcOutput::Found(_) => Spentness::Unspent,
                            ZcOutput::OutOfRange | ZcOutput::Unknown => Spentness::Unknown,
                        },
                    }
                })
                .collect()
        }))
    }

    fn address_full_balance(&self, addr: &ScrAddr) -> Result<u64, ViewError> {
        self.inner.ensure_ready()?;
        Ok(self
            .inner
            .with_lookup(|lookup| balances(lookup.address_txios(addr).values()).full))
    }

    fn address_txio_count(&self, addr: &ScrAddr) -> Result<u64, ViewError> {
        self.inner.ensure_ready()?;
        Ok(self
            .inner
            .with_lookup(|lookup| lookup.address_txios(addr).len() as u64))
    }

    fn create_address_book(&self, wallet_id: &str) -> Result<Vec<AddressBookEntry>, ViewError> {
        let wallet = self.inner.find_wallet(wallet_id)?;
        Ok(self
            .inner
            .with_lookup(|lookup| address_book(wallet.addresses(), lookup)))
    }

    fn top_height(&self) -> u32 {
        self.inner.refresh_top()
    }

    fn tx_by_hash(&self, hash: &Hash) -> Result<TxInfo, ViewError> {
        let inner = &self.inner;
        let snapshot = inner.ctx.zero_conf.snapshot();
        if let Some(tx) = snapshot.tx_by_hash(hash) {
            return Ok(TxInfo {
                raw: tx.raw.clone(),
                height: UNCONFIRMED_HEIGHT,
                is_rbf: tx.is_rbf,
                is_chained_zc: tx.is_chained,
            });
        }
        inner
            .ctx
            .store
            .tx_by_hash(hash)
            .map(|stored| TxInfo {
                raw: stored.raw,
                height: stored.key.height(),
                is_rbf: false,
                is_chained_zc: false,
            })
            .ok_or_else(|| ViewError::not_found("transaction", hash_to_hex(hash)))
    }

    fn header_by_height(&self, height: u32) -> Result<Vec<u8>, ViewError> {
        self.inner
            .ctx
            .store
            .header_by_height(height)
            .map(|h| h.to_bytes())
            .ok_or_else(|| ViewError::not_found("header", height.to_string()))
    }

    fn header_by_hash(&self, hash: &Hash) -> Result<Vec<u8>, ViewError> {
        self.inner
            .ctx
            .store
            .header_by_hash(hash)
            .map(|h| h.to_bytes())
            .ok_or_else(|| ViewError::not_found("header", hash_to_hex(hash)))
    }

    fn node_status(&self) -> NodeStatus {
        self.inner.ctx.feed.node_status()
    }

    async fn estimate_fee(&self, blocks: u32, strategy: &str) -> Result<FeeEstimate, ViewError> {
        Ok(self.inner.ctx.feed.estimate_fee(blocks, strategy).await?)
    }

    async fn broadcast_zc(&self, raw: Vec<u8>) -> Result<Hash, ViewError> {
        let inner = &self.inner;
        Ok(inner.ctx.zero_conf.broadcast_zc(&inner.session_id, raw).await?)
    }

    async fn broadcast_through_rpc(&self, raw: Vec<u8>) -> Result<String, ViewError> {
        Ok(self.inner.ctx.feed.broadcast_through_rpc(&raw).await?)
    }
}
