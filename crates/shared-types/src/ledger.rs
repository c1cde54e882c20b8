//! # Ledger Entries
//!
//! Summarized per-transaction effects on a wallet or address, the unit of
//! paged history.

use crate::entities::Hash;
use crate::keys::TxKey;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

/// The net effect of one transaction on one wallet.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Wallet (or address hex) this entry belongs to.
    pub id: String,
    /// Key of the transaction.
    pub tx_key: TxKey,
    /// Hash of the transaction.
    #[serde_as(as = "Bytes")]
    pub tx_hash: Hash,
    /// Received minus spent, in satoshis.
    pub value: i64,
    /// Block height, `u32::MAX` when unconfirmed.
    pub block_height: u32,
    /// Index of the tx in its block.
    pub tx_index: u16,
    /// First-seen or block time.
    pub tx_time: u32,
    pub is_coinbase: bool,
    /// Every output went back to the wallet that funded it.
    pub is_sent_to_self: bool,
    pub is_rbf: bool,
    pub is_chained_zc: bool,
}

impl LedgerEntry {
    #[must_use]
    pub fn is_zero_conf(&self) -> bool {
        self.tx_key.is_zero_conf()
    }
}

/// Newest first: zero-conf before confirmed, then by descending key.
#[must_use]
pub fn newest_first(a: &LedgerEntry, b: &LedgerEntry) -> std::cmp::Ordering {
    b.tx_key.cmp(&a.tx_key).then_with(|| a.id.cmp(&b.id))
}
