//! # Input Resolution
//!
//! Finds the funding output of every input of a batch of zero-conf
//! transactions. An input is looked up, in order, among:
//!
//! 1. transactions of the same batch
//! 2. the current mempool snapshot
//! 3. the confirmed chain
//!
//! A tx whose parent sits in the same batch but is not resolved yet is
//! marked `ResolveAgain`; the batch is re-walked until a pass makes no
//! progress, so chains of any depth converge regardless of arrival order.

use super::entities::{ParsedTx, ParsedTxState, ResolvedInput};
use super::snapshot::{MempoolSnapshot, ZcOutput};
use shared_types::entities::{Hash, OutPoint};
use shared_types::ports::ChainStore;
use std::collections::HashMap;
use tracing::trace;

/// Outcome of looking up one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Found(ResolvedInput),
    /// Parent is in the batch and still pending.
    Wait,
    /// Spends a missing output index, an invalid parent or an output
    /// already spent on chain.
    Invalid,
    /// Nothing known about the funding tx.
    Missing,
}

/// Counts from one `resolve_batch` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub passes: u32,
    pub resolved: usize,
    pub unresolved: usize,
    pub invalid: usize,
}

fn needs_work(state: ParsedTxState) -> bool {
    matches!(
        state,
        ParsedTxState::Uninitialized | ParsedTxState::ResolveAgain | ParsedTxState::Unresolved
    )
}

fn lookup(
    outpoint: &OutPoint,
    batch: &[ParsedTx],
    local: &HashMap<Hash, usize>,
    pool: &MempoolSnapshot,
    store: &dyn ChainStore,
) -> Lookup {
    if let Some(&parent) = local.get(&outpoint.hash) {
        let parent = &batch[parent];
        return match parent.state {
            ParsedTxState::Resolved => match parent.outputs.get(outpoint.index as usize) {
                Some(out) => Lookup::Found(ResolvedInput {
                    output_key: parent.key.output(outpoint.index),
                    scr_addr: out.scr_addr,
                    value: out.value,
                }),
                None => Lookup::Invalid,
            },
            ParsedTxState::Invalid => Lookup::Invalid,
            ParsedTxState::Unresolved if parent.failed_passes > 0 => Lookup::Missing,
            _ => Lookup::Wait,
        };
    }

    match pool.output(outpoint) {
        ZcOutput::Found(resolved) => return Lookup::Found(resolved),
        ZcOutput::OutOfRange => return Lookup::Invalid,
        ZcOutput::Unknown => {}
    }

    if let Some(stored) = store.output(outpoint) {
        if stored.spender.is_some() {
            return Lookup::Invalid;
        }
        return Lookup::Found(ResolvedInput {
            output_key: stored.key,
            scr_addr: stored.scr_addr,
            value: stored.value,
        });
    }
    if store.tx_key_for_hash(&outpoint.hash).is_some() {
        // funding tx is confirmed but has no such output
        return Lookup::Invalid;
    }
    Lookup::Missing
}

/// Resolve every pending input of `batch` in place.
///
/// On return no transaction is left `Uninitialized` or `ResolveAgain`:
/// each one is `Resolved`, `Unresolved` or `Invalid` (or whatever terminal
/// state it came in with).
pub fn resolve_batch(
    batch: &mut [ParsedTx],
    pool: &MempoolSnapshot,
    store: &dyn ChainStore,
) -> ResolveStats {
    let local: HashMap<Hash, usize> = batch
        .iter()
        .enumerate()
        .map(|(i, tx)| (tx.hash, i))
        .collect();
    let mut stats = ResolveStats::default();

    loop {
        stats.passes += 1;
        let mut progressed = false;

        for i in 0..batch.len() {
            if !needs_work(batch[i].state) {
                continue;
            }

            let lookups: Vec<(usize, Lookup)> = batch[i]
                .inputs
                .iter()
                .enumerate()
                .filter(|(_, input)| input.resolved.is_none())
                .map(|(n, input)| (n, lookup(&input.outpoint, batch, &local, pool, store)))
                .collect();

            let tx = &mut batch[i];
            let before = tx.state;
            let resolved_before = tx.inputs.iter().filter(|i| i.resolved.is_some()).count();
            let mut wait = false;
            let mut invalid = false;
            for (n, found) in lookups {
                match found {
                    Lookup::Found(resolved) => tx.inputs[n].resolved = Some(resolved),
                    Lookup::Wait => wait = true,
                    Lookup::Invalid => invalid = true,
                    Lookup::Missing => {}
                }
            }

            tx.state = if invalid {
                ParsedTxState::Invalid
            } else if tx.all_inputs_resolved() {
                tx.refresh_chained();
                ParsedTxState::Resolved
            } else if wait {
                ParsedTxState::ResolveAgain
            } else {
                ParsedTxState::Unresolved
            };

            let resolved_after = tx.inputs.iter().filter(|i| i.resolved.is_some()).count();
            if tx.state != before || resolved_after != resolved_before {
                progressed = true;
            }
        }

        if !progressed || stats.passes > batch.len() as u32 {
            break;
        }
    }

    for tx in batch.iter_mut() {
        if matches!(
            tx.state,
            ParsedTxState::Uninitialized | ParsedTxState::ResolveAgain
        ) {
            tx.state = ParsedTxState::Unresolved;
        }
        match tx.state {
            ParsedTxState::Resolved => stats.resolved += 1,
            ParsedTxState::Invalid => stats.invalid += 1,
            ParsedTxState::Unresolved => stats.unresolved += 1,
            _ => {}
        }
    }
    trace!(
        passes = stats.passes,
        resolved = stats.resolved,
        unresolved = stats.unresolved,
        invalid = stats.invalid,
        "Batch resolved"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::keys::TxKey;
    use shared_types::memory::InMemoryChainStore;
    use shared_types::tx::{Transaction, TxBuilder};

    fn script(tag: u8) -> Vec<u8> {
        let mut s = vec![0x76, 0xa9, 0x14];
        s.extend_from_slice(&[tag; 20]);
        s.extend_from_slice(&[0x88, 0xac]);
        s
    }

    fn store_with_coinbase() -> (InMemoryChainStore, Transaction) {
        let store = InMemoryChainStore::new();
        let coinbase = TxBuilder::new().coinbase(1).pay(script(1), 1_000).build();
        store.push_block(vec![coinbase.clone()], 1_000);
        (store, coinbase)
    }

    fn parse(id: u32, tx: &Transaction) -> ParsedTx {
        ParsedTx::from_tx(TxKey::zero_conf(id), tx, tx.serialize(), 0)
    }

    /// Builds a chain of `depth` transactions, each spending the previous.
    fn tx_chain(root: OutPoint, depth: usize) -> Vec<Transaction> {
        let mut out = Vec::new();
        let mut prev = root;
        let mut value = 1_000;
        for _ in 0..depth {
            value -= 10;
            let tx = TxBuilder::new().spend(prev).pay(script(2), value).build();
            prev = OutPoint::new(tx.hash(), 0);
            out.push(tx);
        }
        out
    }

    #[test]
    fn test_resolves_against_chain() {
        let (store, coinbase) = store_with_coinbase();
        let tx = TxBuilder::new()
            .spend(OutPoint::new(coinbase.hash(), 0))
            .pay(script(2), 900)
            .build();
        let mut batch = vec![parse(1, &tx)];

        let stats = resolve_batch(&mut batch, &MempoolSnapshot::default(), &store);

        assert_eq!(stats.resolved, 1);
        assert_eq!(batch[0].state, ParsedTxState::Resolved);
        assert!(!batch[0].is_chained);
        assert_eq!(batch[0].inputs[0].resolved.unwrap().value, 1_000);
    }

    #[test]
    fn test_chain_converges_in_reverse_order() {
        let (store, coinbase) = store_with_coinbase();
        let chain = tx_chain(OutPoint::new(coinbase.hash(), 0), 5);
        // children first, keys still in announcement order
        let mut batch: Vec<ParsedTx> = chain
            .iter()
            .rev()
            .enumerate()
            .map(|(i, tx)| parse(i as u32, tx))
            .collect();

        let stats = resolve_batch(&mut batch, &MempoolSnapshot::default(), &store);

        assert_eq!(stats.resolved, 5);
        assert!(batch.iter().all(ParsedTx::is_resolved));
        assert_eq!(batch.iter().filter(|tx| tx.is_chained).count(), 4);
    }

    #[test]
    fn test_missing_parent_is_unresolved() {
        let (store, _) = store_with_coinbase();
        let orphan = TxBuilder::new()
            .spend(OutPoint::new([0xAB; 32], 0))
            .pay(script(2), 5)
            .build();
        let child = TxBuilder::new()
            .spend(OutPoint::new(orphan.hash(), 0))
            .pay(script(3), 4)
            .build();
        let mut batch = vec![parse(1, &child), parse(2, &orphan)];

        let stats = resolve_batch(&mut batch, &MempoolSnapshot::default(), &store);

        assert_eq!(stats.unresolved, 2);
        assert!(batch
            .iter()
            .all(|tx| tx.state == ParsedTxState::Unresolved));
    }

    #[test]
    fn test_spent_on_chain_is_invalid() {
        let (store, coinbase) = store_with_coinbase();
        let spend = TxBuilder::new()
            .spend(OutPoint::new(coinbase.hash(), 0))
            .pay(script(2), 900)
            .build();
        store.push_block(vec![spend], 2_000);

        let double = TxBuilder::new()
            .spend(OutPoint::new(coinbase.hash(), 0))
            .pay(script(3), 800)
            .build();
        let mut batch = vec![parse(1, &double)];
        resolve_batch(&mut batch, &MempoolSnapshot::default(), &store);

        assert_eq!(batch[0].state, ParsedTxState::Invalid);
    }

    #[test]
    fn test_bad_output_index_is_invalid() {
        let (store, coinbase) = store_with_coinbase();
        let tx = TxBuilder::new()
            .spend(OutPoint::new(coinbase.hash(), 3))
            .pay(script(2), 900)
            .build();
        let mut batch = vec![parse(1, &tx)];
        resolve_batch(&mut batch, &MempoolSnapshot::default(), &store);

        assert_eq!(batch[0].state, ParsedTxState::Invalid);
    }

    #[test]
    fn test_child_of_invalid_parent_is_invalid() {
        let (store, coinbase) = store_with_coinbase();
        let parent = TxBuilder::new()
            .spend(OutPoint::new(coinbase.hash(), 9))
            .pay(script(2), 900)
            .build();
        let child = TxBuilder::new()
            .spend(OutPoint::new(parent.hash(), 0))
            .pay(script(3), 800)
            .build();
        let mut batch = vec![parse(1, &child), parse(2, &parent)];
        resolve_batch(&mut batch, &MempoolSnapshot::default(), &store);

        assert!(batch.iter().all(|tx| tx.state == ParsedTxState::Invalid));
    }
}
