//! # External Collaborator Ports
//!
//! The two collaborators this service sits on top of, specified only at
//! their interface boundary:
//!
//! | Port | Role |
//! |------|------|
//! | `ChainStore` | Durable, validated block/tx/address-history index |
//! | `NodeFeed` | Peer node: inventory, fetch-by-hash, broadcast, status |
//!
//! Both are shared across every session, so implementations must be
//! internally thread-safe.

use crate::entities::{BlockHeader, Hash, OutPoint, ScrAddr};
use crate::errors::FeedError;
use crate::keys::{OutputKey, TxKey};
use crate::txio::TxIoPair;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// A confirmed transaction as held by the Chain Store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTx {
    pub key: TxKey,
    pub raw: Vec<u8>,
    pub tx_time: u32,
}

/// A confirmed output as held by the Chain Store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOutput {
    pub key: OutputKey,
    pub value: u64,
    pub script: Vec<u8>,
    pub scr_addr: ScrAddr,
    /// Confirmed transaction spending this output, if any.
    pub spender: Option<TxKey>,
    pub is_coinbase: bool,
    pub tx_time: u32,
}

/// Read access to the confirmed chain.
pub trait ChainStore: Send + Sync {
    /// Current best block, `None` before the first block.
    fn top_header(&self) -> Option<BlockHeader>;

    fn header_by_height(&self, height: u32) -> Option<BlockHeader>;

    fn header_by_hash(&self, hash: &Hash) -> Option<BlockHeader>;

    /// Store key of a confirmed transaction (get-dbkey-for-hash).
    fn tx_key_for_hash(&self, hash: &Hash) -> Option<TxKey>;

    fn tx_by_hash(&self, hash: &Hash) -> Option<StoredTx>;

    /// Hash of the transaction behind a confirmed key.
    fn tx_hash_for_key(&self, key: &TxKey) -> Option<Hash>;

    /// Confirmed output referenced by `outpoint`, on the main chain only.
    fn output(&self, outpoint: &OutPoint) -> Option<StoredOutput>;

    /// Confirmed TxIO pairs of `addr` with a funding or spending leg in
    /// `from_height..=to_height` (get-history-page).
    fn address_history(&self, addr: &ScrAddr, from_height: u32, to_height: u32) -> Vec<TxIoPair>;
}

/// Sync state reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChainState {
    #[default]
    Unknown,
    Syncing,
    Ready,
}

/// Node connectivity and sync status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_connected: bool,
    pub rpc_connected: bool,
    pub chain_state: ChainState,
    pub blocks_per_second: f32,
    pub sync_progress: f32,
}

/// Fee estimate returned by the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeEstimate {
    /// Satoshis per kilobyte.
    pub fee_per_kb: f64,
    pub smart: bool,
    pub error: Option<String>,
}

/// The peer-to-peer node.
#[async_trait]
pub trait NodeFeed: Send + Sync {
    /// Fetch a transaction announced by inventory.
    async fn fetch_tx(&self, hash: &Hash, timeout: Duration) -> Result<Vec<u8>, FeedError>;

    /// Announce a locally originated transaction to the network.
    async fn broadcast_tx(&self, raw: &[u8]) -> Result<(), FeedError>;

    /// Push a transaction through the node's RPC interface.
    async fn broadcast_through_rpc(&self, raw: &[u8]) -> Result<String, FeedError>;

    fn is_connected(&self) -> bool;

    fn node_status(&self) -> NodeStatus;

    async fn estimate_fee(&self, blocks: u32, strategy: &str) -> Result<FeeEstimate, FeedError>;

    /// Unsolicited node activity, in the order the node reported it.
    ///
    /// Every call opens an independent stream; it ends when the feed drops.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<FeedEvent>;
}

/// Activity the node pushes without being asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Transaction hashes announced by inventory.
    Inv(Vec<Hash>),
    /// The chain tip moved.
    NewBlock(ReorgState),
}

/// Chain-tip change handed to the mempool and the views on a new block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorgState {
    pub prev_top: BlockHeader,
    pub new_top: BlockHeader,
    /// Last common block when the previous top was unwound.
    pub branch_point: Option<BlockHeader>,
}

impl ReorgState {
    /// The previous top is still on the main chain.
    #[must_use]
    pub fn prev_top_still_valid(&self) -> bool {
        self.branch_point.is_none()
    }

    /// First height whose contents changed.
    #[must_use]
    pub fn scan_from(&self) -> u32 {
        match &self.branch_point {
            Some(branch) => branch.height + 1,
            None => self.prev_top.height + 1,
        }
    }
}
