//! # In-Memory Adapters
//!
//! Deterministic `ChainStore` and `NodeFeed` implementations. The runtime
//! uses them in standalone mode; every crate's tests build chains with them.

use crate::entities::{double_sha256, BlockHeader, Hash, OutPoint, ScrAddr, ZERO_HASH};
use crate::errors::{FeedError, StoreError};
use crate::keys::{OutputKey, TxKey};
use crate::ports::{
    ChainState, ChainStore, FeeEstimate, FeedEvent, NodeFeed, NodeStatus, ReorgState, StoredOutput,
    StoredTx,
};
use crate::tx::Transaction;
use crate::txio::TxIoPair;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

struct BlockRecord {
    header: BlockHeader,
    txs: Vec<Transaction>,
}

struct TxRecord {
    hash: Hash,
    raw: Vec<u8>,
    tx_time: u32,
}

#[derive(Default)]
struct StoreState {
    chain: Vec<BlockRecord>,
    headers_by_hash: HashMap<Hash, BlockHeader>,
    dup_ids: HashMap<u32, u8>,
    tx_keys: HashMap<Hash, TxKey>,
    txs: HashMap<TxKey, TxRecord>,
    outputs: HashMap<OutPoint, StoredOutput>,
    by_addr: HashMap<ScrAddr, BTreeMap<OutputKey, TxIoPair>>,
}

impl StoreState {
    fn top(&self) -> Option<&BlockHeader> {
        self.chain.last().map(|b| &b.header)
    }

    fn connect(&mut self, txs: Vec<Transaction>, timestamp: u32) -> BlockHeader {
        let height = self.chain.len() as u32;
        let prev_hash = self.top().map_or(ZERO_HASH, |h| h.hash);
        let dup_id = {
            let counter = self.dup_ids.entry(height).or_insert(0);
            let id = *counter;
            *counter = counter.wrapping_add(1);
            id
        };

        let mut preimage = Vec::with_capacity(37 + txs.len() * 32);
        preimage.extend_from_slice(&prev_hash);
        preimage.extend_from_slice(&height.to_le_bytes());
        preimage.push(dup_id);
        for tx in &txs {
            preimage.extend_from_slice(&tx.hash());
        }

        let header = BlockHeader {
            height,
            dup_id,
            hash: double_sha256(&preimage),
            prev_hash,
            timestamp,
            tx_count: txs.len() as u32,
        };

        for (index, tx) in txs.iter().enumerate() {
            let key = TxKey::confirmed(height, dup_id, index as u16);
            self.index_tx(key, tx, timestamp);
        }

        self.headers_by_hash.insert(header.hash, header.clone());
        self.chain.push(BlockRecord {
            header: header.clone(),
            txs,
        });
        header
    }

    fn index_tx(&mut self, key: TxKey, tx: &Transaction, tx_time: u32) {
        let hash = tx.hash();
        let is_coinbase = tx.is_coinbase();

        if !is_coinbase {
            for input in &tx.inputs {
                let Some(spent) = self.outputs.get_mut(&input.outpoint) else {
                    continue;
                };
                spent.spender = Some(key);
                if let Some(pair) = self
                    .by_addr
                    .get_mut(&spent.scr_addr)
                    .and_then(|m| m.get_mut(&spent.key))
                {
                    pair.spender = Some(key);
                }
            }
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            let out_key = key.output(index as u32);
            let scr_addr = output.scr_addr();
            let stored = StoredOutput {
                key: out_key,
                value: output.value,
                script: output.script.clone(),
                scr_addr,
                spender: None,
                is_coinbase,
                tx_time,
            };
            self.outputs.insert(OutPoint::new(hash, index as u32), stored);

            let mut pair = TxIoPair::funded(out_key, output.value, tx_time);
            pair.is_coinbase = is_coinbase;
            self.by_addr.entry(scr_addr).or_default().insert(out_key, pair);
        }

        self.tx_keys.insert(hash, key);
        self.txs.insert(
            key,
            TxRecord {
                hash,
                raw: tx.serialize(),
                tx_time,
            },
        );
    }

    fn disconnect(&mut self) -> Option<BlockHeader> {
        let block = self.chain.pop()?;
        for tx in block.txs.iter().rev() {
            let hash = tx.hash();
            let Some(key) = self.tx_keys.remove(&hash) else {
                continue;
            };
            self.txs.remove(&key);

            for index in 0..tx.outputs.len() {
                let op = OutPoint::new(hash, index as u32);
                if let Some(out) = self.outputs.remove(&op) {
                    if let Some(map) = self.by_addr.get_mut(&out.scr_addr) {
                        map.remove(&out.key);
                    }
                }
            }

            if tx.is_coinbase() {
                continue;
            }
            for input in &tx.inputs {
                let Some(spent) = self.outputs.get_mut(&input.outpoint) else {
                    continue;
                };
                spent.spender = None;
                if let Some(pair) = self
                    .by_addr
                    .get_mut(&spent.scr_addr)
                    .and_then(|m| m.get_mut(&spent.key))
                {
                    pair.spender = None;
                }
            }
        }
        self.headers_by_hash.remove(&block.header.hash);
        Some(block.header)
    }
}

/// A `ChainStore` held entirely in memory.
#[derive(Default)]
pub struct InMemoryChainStore {
    state: RwLock<StoreState>,
}

impl InMemoryChainStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block on top of the current chain.
    pub fn push_block(&self, txs: Vec<Transaction>, timestamp: u32) -> BlockHeader {
        let header = self.state.write().connect(txs, timestamp);
        debug!(height = header.height, txs = header.tx_count, "Block connected");
        header
    }

    /// Append blocks and describe the tip change.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` when the chain is empty.
    pub fn extend(&self, blocks: Vec<Vec<Transaction>>) -> Result<ReorgState, StoreError> {
        let mut state = self.state.write();
        let prev_top = state
            .top()
            .cloned()
            .ok_or_else(|| StoreError::NotFound("chain is empty".into()))?;
        let mut new_top = prev_top.clone();
        for txs in blocks {
            let timestamp = new_top.timestamp + 600;
            new_top = state.connect(txs, timestamp);
        }
        Ok(ReorgState {
            prev_top,
            new_top,
            branch_point: None,
        })
    }

    /// Unwind `depth` blocks and connect `blocks` in their place.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Disconnected` when `depth` reaches past genesis.
    pub fn reorg(&self, depth: u32, blocks: Vec<Vec<Transaction>>) -> Result<ReorgState, StoreError> {
        let mut state = self.state.write();
        let prev_top = state
            .top()
            .cloned()
            .ok_or_else(|| StoreError::NotFound("chain is empty".into()))?;
        if depth >= state.chain.len() as u32 {
            return Err(StoreError::Disconnected { height: 0 });
        }
        for _ in 0..depth {
            state.disconnect();
        }
        let branch_point = state
            .top()
            .cloned()
            .ok_or(StoreError::Disconnected { height: 0 })?;
        let mut new_top = branch_point.clone();
        for txs in blocks {
            let timestamp = new_top.timestamp + 600;
            new_top = state.connect(txs, timestamp);
        }
        debug!(
            branch = branch_point.height,
            new_top = new_top.height,
            "Chain reorganized"
        );
        Ok(ReorgState {
            prev_top,
            new_top,
            branch_point: Some(branch_point),
        })
    }

    #[must_use]
    pub fn height(&self) -> Option<u32> {
        self.state.read().top().map(|h| h.height)
    }
}

impl ChainStore for InMemoryChainStore {
    fn top_header(&self) -> Option<BlockHeader> {
        self.state.read().top().cloned()
    }

    fn header_by_height(&self, height: u32) -> Option<BlockHeader> {
        self.state
            .read()
            .chain
            .get(height as usize)
            .map(|b| b.header.clone())
    }

    fn header_by_hash(&self, hash: &Hash) -> Option<BlockHeader> {
        self.state.read().headers_by_hash.get(hash).cloned()
    }

    fn tx_key_for_hash(&self, hash: &Hash) -> Option<TxKey> {
        self.state.read().tx_keys.get(hash).copied()
    }

    fn tx_by_hash(&self, hash: &Hash) -> Option<StoredTx> {
        let state = self.state.read();
        let key = state.tx_keys.get(hash)?;
        let record = state.txs.get(key)?;
        Some(StoredTx {
            key: *key,
            raw: record.raw.clone(),
            tx_time: record.tx_time,
        })
    }

    fn tx_hash_for_key(&self, key: &TxKey) -> Option<Hash> {
        self.state.read().txs.get(key).map(|r| r.hash)
    }

    fn output(&self, outpoint: &OutPoint) -> Option<StoredOutput> {
        self.state.read().outputs.get(outpoint).cloned()
    }

    fn address_history(&self, addr: &ScrAddr, from_height: u32, to_height: u32) -> Vec<TxIoPair> {
        let state = self.state.read();
        let Some(map) = state.by_addr.get(addr) else {
            return Vec::new();
        };
        let in_range = |h: u32| h >= from_height && h <= to_height;
        map.values()
            .filter(|pair| {
                in_range(pair.funding_key().height())
                    || pair.spender.is_some_and(|s| in_range(s.height()))
            })
            .copied()
            .collect()
    }
}

/// A `NodeFeed` backed by an in-memory mempool.
pub struct MemoryNodeFeed {
    mempool: RwLock<HashMap<Hash, Vec<u8>>>,
    rpc_log: RwLock<Vec<Hash>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<FeedEvent>>>,
    connected: AtomicBool,
    fetch_delay: Duration,
    fee_per_kb: f64,
}

impl Default for MemoryNodeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNodeFeed {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mempool: RwLock::new(HashMap::new()),
            rpc_log: RwLock::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            fetch_delay: Duration::ZERO,
            fee_per_kb: 10_000.0,
        }
    }

    /// Delay every fetch, to exercise batch timeouts.
    #[must_use]
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Make a transaction available for fetching, as if relayed by a peer.
    pub fn relay(&self, tx: &Transaction) -> Hash {
        let hash = tx.hash();
        self.mempool.write().insert(hash, tx.serialize());
        hash
    }

    /// Relay `tx` and announce its hash to every subscriber.
    pub fn announce(&self, tx: &Transaction) -> Hash {
        let hash = self.relay(tx);
        self.emit(FeedEvent::Inv(vec![hash]));
        hash
    }

    /// Report a tip change to every subscriber.
    pub fn announce_block(&self, reorg: ReorgState) {
        self.emit(FeedEvent::NewBlock(reorg));
    }

    fn emit(&self, event: FeedEvent) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|listener| listener.send(event.clone()).is_ok());
        debug!(listeners = listeners.len(), "Feed event emitted");
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Hashes pushed through `broadcast_through_rpc`.
    #[must_use]
    pub fn rpc_broadcasts(&self) -> Vec<Hash> {
        self.rpc_log.read().clone()
    }
}

#[async_trait]
impl NodeFeed for MemoryNodeFeed {
    async fn fetch_tx(&self, hash: &Hash, timeout: Duration) -> Result<Vec<u8>, FeedError> {
        if !self.fetch_delay.is_zero() {
            if self.fetch_delay >= timeout {
                tokio::time::sleep(timeout).await;
                return Err(FeedError::Timeout(timeout.as_millis() as u64));
            }
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.mempool
            .read()
            .get(hash)
            .cloned()
            .ok_or_else(|| FeedError::NotFound(hex::encode(hash)))
    }

    async fn broadcast_tx(&self, raw: &[u8]) -> Result<(), FeedError> {
        if !self.is_connected() {
            return Err(FeedError::Offline);
        }
        let tx = Transaction::parse(raw).map_err(|e| FeedError::Rejected(e.to_string()))?;
        self.mempool.write().insert(tx.hash(), raw.to_vec());
        Ok(())
    }

    async fn broadcast_through_rpc(&self, raw: &[u8]) -> Result<String, FeedError> {
        if !self.is_connected() {
            return Err(FeedError::Offline);
        }
        let tx = Transaction::parse(raw).map_err(|e| FeedError::Rejected(e.to_string()))?;
        self.rpc_log.write().push(tx.hash());
        self.mempool.write().insert(tx.hash(), raw.to_vec());
        Ok("success".to_string())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn node_status(&self) -> NodeStatus {
        let connected = self.is_connected();
        NodeStatus {
            node_connected: connected,
            rpc_connected: connected,
            chain_state: if connected {
                ChainState::Ready
            } else {
                ChainState::Unknown
            },
            blocks_per_second: 0.0,
            sync_progress: if connected { 1.0 } else { 0.0 },
        }
    }

    async fn estimate_fee(&self, blocks: u32, strategy: &str) -> Result<FeeEstimate, FeedError> {
        if !self.is_connected() {
            return Err(FeedError::Offline);
        }
        let blocks = blocks.max(1);
        Ok(FeeEstimate {
            fee_per_kb: self.fee_per_kb / f64::from(blocks),
            smart: strategy.eq_ignore_ascii_case("conservative")
                || strategy.eq_ignore_ascii_case("economical"),
            error: None,
        })
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<FeedEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::TxBuilder;

    fn p2pkh(tag: u8) -> Vec<u8> {
        let mut script = vec![0x76, 0xa9, 0x14];
        script.extend_from_slice(&[tag; 20]);
        script.extend_from_slice(&[0x88, 0xac]);
        script
    }

    #[test]
    fn test_push_block_indexes_outputs() {
        let store = InMemoryChainStore::new();
        let coinbase = TxBuilder::new().coinbase(0).pay(p2pkh(1), 50).build();
        let header = store.push_block(vec![coinbase.clone()], 1000);

        assert_eq!(header.height, 0);
        assert_eq!(store.top_header(), Some(header));
        let out = store.output(&OutPoint::new(coinbase.hash(), 0)).unwrap();
        assert_eq!(out.value, 50);
        assert!(out.is_coinbase);
        assert_eq!(
            store.tx_key_for_hash(&coinbase.hash()),
            Some(TxKey::confirmed(0, 0, 0))
        );
    }

    #[test]
    fn test_spend_marks_history() {
        let store = InMemoryChainStore::new();
        let coinbase = TxBuilder::new().coinbase(0).pay(p2pkh(1), 50).build();
        store.push_block(vec![coinbase.clone()], 1000);

        let spend = TxBuilder::new()
            .spend(OutPoint::new(coinbase.hash(), 0))
            .pay(p2pkh(2), 40)
            .build();
        store.extend(vec![vec![spend.clone()]]).unwrap();

        let addr = ScrAddr::from_script(&p2pkh(1));
        let history = store.address_history(&addr, 0, u32::MAX);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].spender, Some(TxKey::confirmed(1, 0, 0)));

        let only_block_one = store.address_history(&addr, 1, 1);
        assert_eq!(only_block_one.len(), 1);
        assert!(store.address_history(&addr, 2, 5).is_empty());
    }

    #[test]
    fn test_reorg_unwinds_and_reassigns_dup_id() {
        let store = InMemoryChainStore::new();
        let coinbase = TxBuilder::new().coinbase(0).pay(p2pkh(1), 50).build();
        store.push_block(vec![coinbase.clone()], 1000);

        let spend = TxBuilder::new()
            .spend(OutPoint::new(coinbase.hash(), 0))
            .pay(p2pkh(2), 40)
            .build();
        store.extend(vec![vec![spend.clone()]]).unwrap();

        let other = TxBuilder::new().coinbase(7).pay(p2pkh(3), 50).build();
        let state = store.reorg(1, vec![vec![other.clone()]]).unwrap();

        assert!(!state.prev_top_still_valid());
        assert_eq!(state.branch_point.as_ref().map(|h| h.height), Some(0));
        assert_eq!(state.new_top.dup_id, 1);
        assert!(store.tx_key_for_hash(&spend.hash()).is_none());
        let restored = store.output(&OutPoint::new(coinbase.hash(), 0)).unwrap();
        assert_eq!(restored.spender, None);
    }

    #[tokio::test]
    async fn test_feed_fetch_and_broadcast() {
        let feed = MemoryNodeFeed::new();
        let tx = TxBuilder::new()
            .spend(OutPoint::new([1u8; 32], 0))
            .pay(p2pkh(1), 5)
            .build();

        assert!(feed.fetch_tx(&tx.hash(), Duration::from_millis(10)).await.is_err());
        feed.broadcast_tx(&tx.serialize()).await.unwrap();
        let raw = feed.fetch_tx(&tx.hash(), Duration::from_millis(10)).await.unwrap();
        assert_eq!(raw, tx.serialize());

        assert!(matches!(
            feed.broadcast_tx(&[1, 2, 3]).await,
            Err(FeedError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_feed_refuses_broadcast() {
        let feed = MemoryNodeFeed::new();
        feed.set_connected(false);
        assert!(matches!(feed.broadcast_tx(&[0]).await, Err(FeedError::Offline)));
        assert_eq!(feed.node_status().chain_state, ChainState::Unknown);
    }

    #[tokio::test]
    async fn test_feed_events_reach_every_subscriber_in_order() {
        let store = InMemoryChainStore::new();
        store.push_block(vec![TxBuilder::new().coinbase(0).pay(p2pkh(1), 50).build()], 0);
        let feed = MemoryNodeFeed::new();
        let mut first = feed.subscribe();
        let mut second = feed.subscribe();

        let tx = TxBuilder::new()
            .spend(OutPoint::new([4u8; 32], 0))
            .pay(p2pkh(2), 5)
            .build();
        let hash = feed.announce(&tx);
        let reorg = store
            .extend(vec![vec![TxBuilder::new().coinbase(1).pay(p2pkh(3), 50).build()]])
            .unwrap();
        feed.announce_block(reorg.clone());

        for events in [&mut first, &mut second] {
            assert_eq!(events.recv().await, Some(FeedEvent::Inv(vec![hash])));
            assert_eq!(events.recv().await, Some(FeedEvent::NewBlock(reorg.clone())));
        }
        assert!(feed.fetch_tx(&hash, Duration::from_millis(10)).await.is_ok());

        drop(first);
        feed.announce(&tx);
        assert_eq!(feed.listeners.lock().len(), 1);
        drop(feed);
        assert_eq!(second.recv().await, Some(FeedEvent::Inv(vec![hash])));
        assert_eq!(second.recv().await, None);
    }
}
