//! # TxIO Pairs
//!
//! The funding/spending relation of one output, as tracked for the address
//! that output pays to. Either leg may be confirmed or zero-conf.

use crate::keys::{OutputKey, TxKey};
use serde::{Deserialize, Serialize};

/// Funding/spending relation for one output of one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIoPair {
    /// The funded output.
    pub output: OutputKey,
    /// Transaction spending the output, if any.
    pub spender: Option<TxKey>,
    /// Output value in satoshis.
    pub value: u64,
    /// Time the funding tx was first seen (zero-conf) or mined.
    pub tx_time: u32,
    /// The funding tx is a coinbase.
    pub is_coinbase: bool,
    /// Either leg came from an RBF-signalling zero-conf tx.
    pub is_rbf: bool,
    /// The funding tx spends another zero-conf tx.
    pub is_chained_zc: bool,
}

impl TxIoPair {
    /// A funded, unspent pair.
    #[must_use]
    pub fn funded(output: OutputKey, value: u64, tx_time: u32) -> Self {
        Self {
            output,
            spender: None,
            value,
            tx_time,
            is_coinbase: false,
            is_rbf: false,
            is_chained_zc: false,
        }
    }

    #[must_use]
    pub fn funding_key(&self) -> TxKey {
        self.output.tx_key()
    }

    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.spender.is_some()
    }

    #[must_use]
    pub fn is_zc_funding(&self) -> bool {
        self.output.is_zero_conf()
    }

    #[must_use]
    pub fn is_zc_spend(&self) -> bool {
        self.spender.is_some_and(|key| key.is_zero_conf())
    }

    /// True when either leg is zero-conf.
    #[must_use]
    pub fn has_zc(&self) -> bool {
        self.is_zc_funding() || self.is_zc_spend()
    }

    /// Confirmed funding, not spent by anything.
    #[must_use]
    pub fn is_spendable(&self) -> bool {
        !self.is_zc_funding() && !self.is_spent()
    }

    /// Zero-conf funding, not spent by anything.
    #[must_use]
    pub fn is_unconfirmed_unspent(&self) -> bool {
        self.is_zc_funding() && !self.is_spent()
    }

    /// Merge a spend learned from another source, zero-conf winning ties
    /// only when no confirmed spend is known.
    pub fn apply_spend(&mut self, spender: TxKey) {
        match self.spender {
            Some(existing) if !existing.is_zero_conf() => {}
            _ => self.spender = Some(spender),
        }
    }
}
