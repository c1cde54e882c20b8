//! # Inbound Port - WalletViewApi
//!
//! Everything a session can ask of its view. One view exists per session;
//! wallet and ledger queries fail with `NotReady` until `go_online` ran.

use crate::domain::{
    AddressBookEntry, Balances, BalancesAndCount, DelegateTarget, GroupKind, ScanNotification,
    Spentness, TxInfo, ViewError,
};
use async_trait::async_trait;
use shared_types::entities::{Hash, OutPoint, ScrAddr, Utxo};
use shared_types::keys::TxKey;
use shared_types::ledger::LedgerEntry;
use shared_types::ports::{FeeEstimate, NodeStatus};
use std::collections::BTreeMap;

/// Per-session query and registration API.
#[async_trait]
pub trait WalletViewApi: Send + Sync {
    fn session_id(&self) -> &str;

    fn is_ready(&self) -> bool;

    /// Scan id; bumped by every scan that touched a tracked address.
    fn update_id(&self) -> u64;

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Run the initial scan and publish `Ready`. Returns the top height.
    async fn go_online(&self) -> Result<u32, ViewError>;

    /// React to a chain or mempool change. Returns whether any tracked
    /// address was touched.
    fn scan_wallets(&self, notification: &ScanNotification) -> bool;

    /// Merge addresses into a wallet. Completion is asynchronous: a
    /// `Refresh` carrying `registration_id` is published once the
    /// addresses are watched (none for an empty id).
    fn register_addresses(
        &self,
        kind: GroupKind,
        wallet_id: &str,
        addrs: Vec<ScrAddr>,
        is_new: bool,
        registration_id: &str,
    ) -> Result<(), ViewError>;

    fn is_registering(&self) -> bool;

    /// Resolves once no registration is outstanding.
    async fn registrations_settled(&self);

    /// Release registrations and delegates.
    fn close(&self);

    // =========================================================================
    // LEDGERS
    // =========================================================================

    /// Create a ledger delegate; returns its id.
    fn ledger_delegate(&self, target: DelegateTarget) -> Result<String, ViewError>;

    /// A page of a delegate's history. `rebuild` or `remap` force a fresh
    /// merge even when the cached pages match the current scan id.
    fn history_page(
        &self,
        delegate_id: &str,
        page_id: usize,
        rebuild: bool,
        remap: bool,
    ) -> Result<Vec<LedgerEntry>, ViewError>;

    fn page_count(&self, delegate_id: &str) -> Result<usize, ViewError>;

    /// Restrict the wallets group's history to `ids` (empty clears).
    async fn update_wallets_ledger_filter(&self, ids: Vec<String>) -> Result<(), ViewError>;

    fn history_for_wallet_selection(&self, ids: &[String]) -> Result<Vec<LedgerEntry>, ViewError>;

    /// Ledger entries of pooled transactions `keys` across every wallet.
    fn zero_conf_entries(&self, keys: &[TxKey]) -> Vec<LedgerEntry>;

    // =========================================================================
    // BALANCES AND OUTPUTS
    // =========================================================================

    fn balances_and_count(&self, wallet_id: &str) -> Result<BalancesAndCount, ViewError>;

    fn addr_balances(&self, wallet_id: &str) -> Result<BTreeMap<ScrAddr, Balances>, ViewError>;

    fn addr_txn_counts(&self, wallet_id: &str) -> Result<BTreeMap<ScrAddr, u64>, ViewError>;

    /// Confirmed outputs not spent by any pooled tx, oldest first, until
    /// `value` is covered.
    fn spendable_txouts_for_value(&self, wallet_id: &str, value: u64) -> Result<Vec<Utxo>, ViewError>;

    /// Confirmed outputs of one wallet address not spent by any pooled tx,
    /// oldest first.
    fn spendable_txouts_for_addr(&self, wallet_id: &str, addr: &ScrAddr) -> Result<Vec<Utxo>, ViewError>;

    fn spendable_zc_list(&self, wallet_id: &str) -> Result<Vec<Utxo>, ViewError>;

    fn rbf_txout_list(&self, wallet_id: &str) -> Result<Vec<Utxo>, ViewError>;

    fn utxos_for_addr_list(&self, addrs: &[ScrAddr]) -> Result<Vec<Utxo>, ViewError>;

    fn outpoint_spentness(&self, outpoints: &[OutPoint]) -> Result<Vec<Spentness>, ViewError>;

    fn address_full_balance(&self, addr: &ScrAddr) -> Result<u64, ViewError>;

    fn address_txio_count(&self, addr: &ScrAddr) -> Result<u64, ViewError>;

    fn create_address_book(&self, wallet_id: &str) -> Result<Vec<AddressBookEntry>, ViewError>;

    // =========================================================================
    // CHAIN AND NODE
    // =========================================================================

    fn top_height(&self) -> u32;

    fn tx_by_hash(&self, hash: &Hash) -> Result<TxInfo, ViewError>;

    fn header_by_height(&self, height: u32) -> Result<Vec<u8>, ViewError>;

    fn header_by_hash(&self, hash: &Hash) -> Result<Vec<u8>, ViewError>;

    fn node_status(&self) -> NodeStatus;

    async fn estimate_fee(&self, blocks: u32, strategy: &str) -> Result<FeeEstimate, ViewError>;

    async fn broadcast_zc(&self, raw: Vec<u8>) -> Result<Hash, ViewError>;

    async fn broadcast_through_rpc(&self, raw: Vec<u8>) -> Result<String, ViewError>;
}
