//! # Ledger Computation
//!
//! Folds TxIO pairs into per-transaction ledger entries, balances and
//! counts. Everything here is a pure function of a [`Lookup`].

use super::entities::{AddressBookEntry, Balances};
use super::lookup::Lookup;
use shared_types::entities::{Hash, ScrAddr};
use shared_types::keys::TxKey;
use shared_types::ledger::{newest_first, LedgerEntry};
use shared_types::txio::TxIoPair;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Balances over a set of TxIO pairs.
pub fn balances<'a>(pairs: impl IntoIterator<Item = &'a TxIoPair>) -> Balances {
    let mut total = Balances::default();
    for pair in pairs {
        if pair.is_spent() {
            continue;
        }
        total.full += pair.value;
        if pair.is_zc_funding() {
            total.unconfirmed += pair.value;
        } else {
            total.spendable += pair.value;
        }
    }
    total
}

/// Distinct transactions funding or spending through the pairs.
pub fn tx_keys<'a>(pairs: impl IntoIterator<Item = &'a TxIoPair>) -> BTreeSet<TxKey> {
    let mut keys = BTreeSet::new();
    for pair in pairs {
        keys.insert(pair.funding_key());
        if let Some(spender) = pair.spender {
            keys.insert(spender);
        }
    }
    keys
}

#[derive(Default)]
struct Flow {
    received: u64,
    sent: u64,
    coinbase: bool,
}

/// Ledger entries of `addresses` taken together, newest first.
///
/// Transfers between two of the addresses net out inside one entry.
pub fn ledger_entries(id: &str, addresses: &BTreeSet<ScrAddr>, lookup: &Lookup<'_>) -> Vec<LedgerEntry> {
    let mut flows: BTreeMap<TxKey, Flow> = BTreeMap::new();
    for addr in addresses {
        for pair in lookup.address_txios(addr).values() {
            let flow = flows.entry(pair.funding_key()).or_default();
            flow.received += pair.value;
            flow.coinbase |= pair.is_coinbase;
            if let Some(spender) = pair.spender {
                flows.entry(spender).or_default().sent += pair.value;
            }
        }
    }

    let mut entries: Vec<LedgerEntry> = flows
        .into_iter()
        .filter_map(|(key, flow)| {
            let Some(meta) = lookup.tx_meta(&key) else {
                debug!(tx_key = %key, wallet = id, "Ledger entry without transaction, skipped");
                return None;
            };
            let is_sent_to_self = flow.sent > 0
                && meta
                    .outputs
                    .iter()
                    .all(|out| addresses.contains(&out.scr_addr));
            Some(LedgerEntry {
                id: id.to_string(),
                tx_key: key,
                tx_hash: meta.hash,
                value: flow.received as i64 - flow.sent as i64,
                block_height: key.height(),
                tx_index: key.tx_index(),
                tx_time: meta.tx_time,
                is_coinbase: flow.coinbase,
                is_sent_to_self,
                is_rbf: meta.is_rbf,
                is_chained_zc: meta.is_chained,
            })
        })
        .collect();
    entries.sort_by(newest_first);
    entries
}

/// Addresses outside `addresses` paid by transactions spending from them.
pub fn address_book(addresses: &BTreeSet<ScrAddr>, lookup: &Lookup<'_>) -> Vec<AddressBookEntry> {
    let spenders: BTreeSet<TxKey> = addresses
        .iter()
        .flat_map(|addr| lookup.address_txios(addr).into_values())
        .filter_map(|pair| pair.spender)
        .collect();

    let mut book: BTreeMap<ScrAddr, Vec<Hash>> = BTreeMap::new();
    for key in spenders {
        let Some(meta) = lookup.tx_meta(&key) else {
            continue;
        };
        for out in meta.outputs.iter().filter(|o| !addresses.contains(&o.scr_addr)) {
            let hashes = book.entry(out.scr_addr).or_default();
            if !hashes.contains(&meta.hash) {
                hashes.push(meta.hash);
            }
        }
    }
    book.into_iter()
        .map(|(scr_addr, tx_hashes)| AddressBookEntry { scr_addr, tx_hashes })
        .collect()
}
