//! # Zero-Conf Entities
//!
//! `ParsedTx` and its resolution state machine, plus the engine config.

use shared_types::entities::{Hash, OutPoint, ScrAddr};
use shared_types::keys::{OutputKey, TxKey};
use shared_types::tx::Transaction;
use shared_types::txio::TxIoPair;
use std::collections::BTreeSet;
use std::time::Duration;

/// Resolution state of a zero-conf transaction.
///
/// ```text
/// [Uninitialized] ──resolve──→ [Resolved] ──block──→ [Mined]
///        │                         ↑
///        ├──→ [ResolveAgain] ──────┘   (parent in same batch)
///        ├──→ [Unresolved]  ──age-out──→ dropped
///        └──→ [Invalid]     ──→ dropped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParsedTxState {
    /// Fetched, inputs not looked at yet.
    Uninitialized,
    /// Every input resolved; immutable from here on.
    Resolved,
    /// Waiting on a parent in the same batch.
    ResolveAgain,
    /// At least one input could not be found anywhere.
    Unresolved,
    /// Malformed, or spends an output already spent on chain.
    Invalid,
    /// Confirmed in a block.
    Mined,
}

/// Where a resolved input's funds come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedInput {
    pub output_key: OutputKey,
    pub scr_addr: ScrAddr,
    pub value: u64,
}

impl ResolvedInput {
    /// The funding output is itself zero-conf.
    #[must_use]
    pub fn is_zero_conf(&self) -> bool {
        self.output_key.is_zero_conf()
    }
}

/// One input and, once found, what it spends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTxIn {
    pub outpoint: OutPoint,
    pub resolved: Option<ResolvedInput>,
}

/// One output with its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTxOut {
    pub scr_addr: ScrAddr,
    pub value: u64,
    pub script: Vec<u8>,
}

/// A decoded zero-conf transaction plus its resolution state.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTx {
    pub key: TxKey,
    pub hash: Hash,
    pub raw: Vec<u8>,
    pub tx_time: u32,
    pub state: ParsedTxState,
    pub inputs: Vec<ParsedTxIn>,
    pub outputs: Vec<ParsedTxOut>,
    pub is_rbf: bool,
    /// Spends at least one zero-conf output.
    pub is_chained: bool,
    /// Parses that ended with this tx still `Unresolved`.
    pub failed_passes: u32,
}

impl ParsedTx {
    /// Decode a fetched transaction. Undecodable bytes yield an `Invalid`
    /// entry so the caller can still report on the hash.
    #[must_use]
    pub fn from_raw(key: TxKey, hash: Hash, raw: Vec<u8>, tx_time: u32) -> Self {
        match Transaction::parse(&raw) {
            Ok(tx) if tx.hash() == hash && !tx.is_coinbase() => Self::from_tx(key, &tx, raw, tx_time),
            _ => Self {
                key,
                hash,
                raw,
                tx_time,
                state: ParsedTxState::Invalid,
                inputs: Vec::new(),
                outputs: Vec::new(),
                is_rbf: false,
                is_chained: false,
                failed_passes: 0,
            },
        }
    }

    /// Build from an already decoded transaction.
    #[must_use]
    pub fn from_tx(key: TxKey, tx: &Transaction, raw: Vec<u8>, tx_time: u32) -> Self {
        Self {
            key,
            hash: tx.hash(),
            raw,
            tx_time,
            state: ParsedTxState::Uninitialized,
            inputs: tx
                .inputs
                .iter()
                .map(|input| ParsedTxIn {
                    outpoint: input.outpoint,
                    resolved: None,
                })
                .collect(),
            outputs: tx
                .outputs
                .iter()
                .map(|output| ParsedTxOut {
                    scr_addr: output.scr_addr(),
                    value: output.value,
                    script: output.script.clone(),
                })
                .collect(),
            is_rbf: tx.is_rbf(),
            is_chained: false,
            failed_passes: 0,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state == ParsedTxState::Resolved
    }

    #[must_use]
    pub fn all_inputs_resolved(&self) -> bool {
        self.inputs.iter().all(|input| input.resolved.is_some())
    }

    /// Forget every input resolution, e.g. after the chain reorganized.
    pub fn reset_resolution(&mut self) {
        for input in &mut self.inputs {
            input.resolved = None;
        }
        self.is_chained = false;
        self.state = ParsedTxState::Uninitialized;
    }

    /// Recompute the chained flag from resolved inputs.
    pub fn refresh_chained(&mut self) {
        self.is_chained = self
            .inputs
            .iter()
            .filter_map(|input| input.resolved.as_ref())
            .any(ResolvedInput::is_zero_conf);
    }

    /// Hashes of the transactions this one spends from.
    pub fn parent_hashes(&self) -> impl Iterator<Item = &Hash> {
        self.inputs.iter().map(|input| &input.outpoint.hash)
    }

    /// Every address funded by or spending through this transaction.
    #[must_use]
    pub fn addresses(&self) -> BTreeSet<ScrAddr> {
        let mut addrs: BTreeSet<ScrAddr> = self.outputs.iter().map(|o| o.scr_addr).collect();
        addrs.extend(
            self.inputs
                .iter()
                .filter_map(|input| input.resolved.as_ref())
                .map(|r| r.scr_addr),
        );
        addrs
    }

    /// TxIO pairs this transaction contributes, per address.
    ///
    /// Outputs yield funded pairs; resolved inputs yield pairs for the
    /// output they spend with this tx as the spending leg.
    #[must_use]
    pub fn txios(&self) -> Vec<(ScrAddr, TxIoPair)> {
        let mut pairs = Vec::with_capacity(self.inputs.len() + self.outputs.len());
        for (index, output) in self.outputs.iter().enumerate() {
            let mut pair = TxIoPair::funded(self.key.output(index as u32), output.value, self.tx_time);
            pair.is_rbf = self.is_rbf;
            pair.is_chained_zc = self.is_chained;
            pairs.push((output.scr_addr, pair));
        }
        for resolved in self.inputs.iter().filter_map(|input| input.resolved.as_ref()) {
            let mut pair = TxIoPair::funded(resolved.output_key, resolved.value, self.tx_time);
            pair.spender = Some(self.key);
            pair.is_rbf = self.is_rbf;
            pairs.push((resolved.scr_addr, pair));
        }
        pairs
    }
}

/// Zero-conf engine configuration.
#[derive(Debug, Clone)]
pub struct ZeroConfConfig {
    /// How long a batch waits for its fetches.
    pub fetch_timeout: Duration,
    /// Upper bound on concurrent fetches.
    pub max_fetch_workers: usize,
    /// How long a broadcast waits for the tx to enter the mempool.
    pub broadcast_timeout: Duration,
    /// Parses a tx may stay `Unresolved` before it is dropped.
    pub max_unresolved_passes: u32,
}

impl Default for ZeroConfConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_millis(3000),
            max_fetch_workers: 5,
            broadcast_timeout: Duration::from_millis(10_000),
            max_unresolved_passes: 3,
        }
    }
}
