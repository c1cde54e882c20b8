//! # Wallet View
//!
//! Per-session view over the confirmed chain and the current mempool
//! snapshot: wallet and lockbox groups, balances, paged ledgers, UTXO
//! selection and spentness queries. A shared [`AddressFilter`] decides
//! which addresses are watched and by which sessions.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Registration is additive only | `domain/group.rs` - `Wallet::add()` |
//! | A registration id is acknowledged once | `service/view.rs` - `acknowledge()` |
//! | Queries read one pinned snapshot | `service/view.rs` - `with_lookup()` |
//! | Zero-conf spend overrides confirmed unspent | `domain/lookup.rs` - `address_txios()` |
//! | Cached pages are tied to one scan id | `domain/pager.rs` - `is_current()` |
//!
//! ## Registration Flow
//!
//! ```text
//! register_addresses ──→ AddressFilter batch ──ack──→ add to wallet
//!                                                      │
//!                     fold pooled activity (ZeroConf) ←┤
//!                                                      └──→ Refresh(Registration, id)
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service/view.rs           - WalletView, ViewContext            │
//! │  service/address_filter.rs - AddressFilter (implements ZcInterest)│
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - WalletViewApi trait                        │
//! │  ports/outbound.rs - ChainStore, NodeFeed, ZeroConfApi, bus     │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/lookup.rs - chain + snapshot composition, meta cache    │
//! │  domain/ledger.rs - balances, ledger entries, address book      │
//! │  domain/group.rs  - wallets, groups, merged history             │
//! │  domain/pager.rs  - HistoryPager                                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    AddressBookEntry, Balances, BalancesAndCount, DelegateTarget, GroupKind, ScanNotification,
    Spentness, TxInfo, ViewConfig, ViewError, DEFAULT_PAGE_SIZE,
};
pub use ports::WalletViewApi;
pub use service::{AddressFilter, ViewContext, WalletView};
