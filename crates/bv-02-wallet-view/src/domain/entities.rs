//! # View Entities
//!
//! Values computed by a wallet view and handed to sessions.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_types::entities::{Hash, ScrAddr};
use shared_types::keys::TxKey;

/// Default number of ledger entries per history page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Wallet view configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    /// Ledger entries per history page.
    pub page_size: usize,
    /// Confirmed transactions whose metadata is kept in memory.
    pub tx_cache_size: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            tx_cache_size: 4_096,
        }
    }
}

/// The two wallet groups a view holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKind {
    Wallets,
    Lockboxes,
}

impl GroupKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wallets => "wallets",
            Self::Lockboxes => "lockboxes",
        }
    }
}

/// Balance triple of a wallet or address, in satoshis.
///
/// `full` = `spendable` + `unconfirmed`: outputs spent by a zero-conf
/// transaction count toward neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub full: u64,
    pub spendable: u64,
    pub unconfirmed: u64,
}

impl Balances {
    pub(crate) fn merge(&mut self, other: Balances) {
        self.full += other.full;
        self.spendable += other.spendable;
        self.unconfirmed += other.unconfirmed;
    }
}

/// Balances of a wallet plus the number of transactions touching it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancesAndCount {
    pub balances: Balances,
    pub tx_count: u64,
}

/// An address outside the wallet that received funds from it.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBookEntry {
    pub scr_addr: ScrAddr,
    #[serde_as(as = "Vec<Bytes>")]
    pub tx_hashes: Vec<Hash>,
}

/// Spent state of one outpoint.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Spentness {
    Unspent,
    /// `height` is `u32::MAX` when the spender is a zero-conf transaction.
    Spent {
        height: u32,
        #[serde_as(as = "Bytes")]
        spender: Hash,
    },
    /// The outpoint is neither on chain nor in the mempool.
    Unknown,
}

/// A transaction returned by hash lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInfo {
    pub raw: Vec<u8>,
    /// `u32::MAX` when unconfirmed.
    pub height: u32,
    pub is_rbf: bool,
    pub is_chained_zc: bool,
}

/// What triggered a wallet scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanNotification {
    /// Initial scan, on `GoOnline`.
    Init,
    /// The chain moved; heights from `scan_from` changed.
    NewBlock {
        scan_from: u32,
        invalidated_zc: Vec<TxKey>,
    },
    /// The mempool changed on these addresses.
    ZeroConf {
        addresses: Vec<ScrAddr>,
        invalidated: Vec<TxKey>,
    },
    /// Full reload.
    Refresh,
}

/// What a ledger delegate pages over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateTarget {
    Group(GroupKind),
    Address(ScrAddr),
}
