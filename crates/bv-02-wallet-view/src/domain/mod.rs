//! Domain layer for wallet views: pure computation over a pinned snapshot.

pub mod entities;
pub mod errors;
pub mod group;
pub mod ledger;
pub mod lookup;
pub mod pager;

pub use entities::{
    AddressBookEntry, Balances, BalancesAndCount, DelegateTarget, GroupKind, ScanNotification,
    Spentness, TxInfo, ViewConfig, DEFAULT_PAGE_SIZE,
};
pub use errors::ViewError;
pub use group::{Wallet, WalletGroup};
pub use ledger::{address_book, balances, ledger_entries, tx_keys};
pub use lookup::{Lookup, TxMeta, TxMetaCache};
pub use pager::HistoryPager;
