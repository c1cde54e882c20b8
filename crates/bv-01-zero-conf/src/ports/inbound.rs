//! # Inbound Port - ZeroConfApi
//!
//! Driving port of the zero-conf engine.
//!
//! | Method | Caller |
//! |--------|--------|
//! | `process_inv` | Node Feed inventory handler |
//! | `broadcast_zc` | Session command `BroadcastZc` |
//! | `purge` | Runtime block handler, before `NewBlock` goes out |
//! | `snapshot` | Wallet views, session queries |
//! | `shutdown` | Runtime shutdown |

use crate::domain::{MempoolSnapshot, PurgeResult, ZeroConfError};
use async_trait::async_trait;
use shared_types::entities::Hash;
use shared_types::ports::ReorgState;
use std::sync::Arc;
use std::time::Duration;

/// Primary API of the zero-conf engine.
///
/// Mutations go through one actor queue and apply in submission order;
/// reads return the last published snapshot and never wait on a writer.
///
/// # Example
///
/// ```rust,ignore
/// use bv_01_zero_conf::ports::ZeroConfApi;
///
/// async fn on_inv(engine: &impl ZeroConfApi, hashes: Vec<[u8; 32]>) {
///     engine.process_inv(hashes, true, Duration::from_secs(3)).await?;
///     let snapshot = engine.snapshot();
///     println!("{} zero-conf txs", snapshot.len());
/// }
/// ```
#[async_trait]
pub trait ZeroConfApi: Send + Sync {
    /// Queue announced hashes for fetching and parsing.
    ///
    /// Hashes already pooled or already pending are skipped. With `extend`
    /// set (network inventory) nothing is queued while no address is watched.
    ///
    /// Returns the number of hashes queued.
    ///
    /// # Errors
    /// - `Shutdown`: the engine no longer accepts work
    async fn process_inv(
        &self,
        hashes: Vec<Hash>,
        extend: bool,
        timeout: Duration,
    ) -> Result<usize, ZeroConfError>;

    /// Push a locally originated transaction to the node and track it.
    ///
    /// Acceptance is reported asynchronously: if the tx is not in the
    /// mempool within the broadcast timeout, an `Error` event carrying its
    /// hash is published for `session_id`.
    ///
    /// # Errors
    /// - `Parse` / `Coinbase`: the bytes are not a relayable transaction
    /// - `AlreadyMined`: the tx is confirmed
    /// - `Offline` / `Feed`: the node could not take it
    async fn broadcast_zc(&self, session_id: &str, raw: Vec<u8>) -> Result<Hash, ZeroConfError>;

    /// Reconcile the mempool with a new chain tip.
    ///
    /// # Errors
    /// - `Shutdown`: the engine stopped before running the purge
    async fn purge(&self, reorg: ReorgState) -> Result<PurgeResult, ZeroConfError>;

    /// Latest published mempool snapshot.
    fn snapshot(&self) -> Arc<MempoolSnapshot>;

    /// Stop the actor after the actions already queued.
    async fn shutdown(&self);
}
