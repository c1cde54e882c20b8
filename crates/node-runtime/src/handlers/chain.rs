//! # Chain Handler
//!
//! Turns chain and node activity into engine actions and bus events.
//!
//! ## Flow
//!
//! ```text
//! new tip ──→ ZeroConf purge ──→ NewBlock ──→ session dispatcher ──→ views
//! inventory ──→ ZeroConf process_inv ──→ ZeroConf events (per session)
//! node status poll ──→ NodeStatus (on change)
//! ```
//!
//! In a running node both chain inputs arrive as [`FeedEvent`]s and
//! [`ChainHandler::listen`] applies them one at a time, in feed order.
//!
//! `NewBlock` is only published once the purge for that tip completed, so a
//! view rescanning on `NewBlock` never sees zero-conf txs the tip mined.

use bv_01_zero_conf::{ZeroConfApi, ZeroConfError};
use shared_bus::{EventPublisher, IndexerEvent};
use shared_types::entities::Hash;
use shared_types::ports::{FeedEvent, NodeFeed, NodeStatus, ReorgState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

pub struct ChainHandler {
    zero_conf: Arc<dyn ZeroConfApi>,
    publisher: Arc<dyn EventPublisher>,
    fetch_timeout: Duration,
}

impl ChainHandler {
    pub fn new(
        zero_conf: Arc<dyn ZeroConfApi>,
        publisher: Arc<dyn EventPublisher>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            zero_conf,
            publisher,
            fetch_timeout,
        }
    }

    /// Reconcile the mempool with a new tip, then announce the tip.
    ///
    /// Returns the number of bus subscribers that got `NewBlock`.
    pub async fn on_new_block(&self, reorg: ReorgState) -> Result<usize, ZeroConfError> {
        let height = reorg.new_top.height;
        let scan_from = reorg.scan_from();
        let branch_height = reorg.branch_point.as_ref().map(|header| header.height);

        let purged = self.zero_conf.purge(reorg).await?;
        info!(
            height,
            scan_from,
            ?branch_height,
            mined = purged.mined.len(),
            invalidated = purged.invalidated.len(),
            "New block"
        );

        let event = IndexerEvent::NewBlock {
            height,
            scan_from,
            branch_height,
            invalidated_zc: purged.invalidated.into_iter().collect(),
            mined_zc: purged.mined.into_iter().collect(),
        };
        Ok(self.publisher.publish(event).await)
    }

    /// Hashes announced by the node's inventory.
    pub async fn on_inv(&self, hashes: Vec<Hash>) -> Result<usize, ZeroConfError> {
        let queued = self
            .zero_conf
            .process_inv(hashes, true, self.fetch_timeout)
            .await?;
        debug!(queued, "Inventory queued");
        Ok(queued)
    }

    /// Apply feed events until the feed closes, the engine stops or `stop`
    /// flips.
    pub async fn listen(
        &self,
        mut events: mpsc::UnboundedReceiver<FeedEvent>,
        mut stop: watch::Receiver<bool>,
    ) {
        loop {
            let event = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = stop.changed() => break,
            };
            let applied = match event {
                FeedEvent::Inv(hashes) => self.on_inv(hashes).await.map(|_| ()),
                FeedEvent::NewBlock(reorg) => self.on_new_block(reorg).await.map(|_| ()),
            };
            match applied {
                Ok(()) => {}
                Err(ZeroConfError::Shutdown) => break,
                Err(e) => warn!(error = %e, "Feed event not applied"),
            }
        }
        debug!("Feed listener stopped");
    }
}

/// Poll the node feed and publish `NodeStatus` whenever it changes, until
/// `stop` flips.
pub async fn run_status_monitor(
    feed: Arc<dyn NodeFeed>,
    publisher: Arc<dyn EventPublisher>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut last: Option<NodeStatus> = None;
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = feed.node_status();
                if last.as_ref() != Some(&status) {
                    debug!(connected = status.node_connected, "Node status changed");
                    publisher.publish(IndexerEvent::NodeStatus(status.clone())).await;
                    last = Some(status);
                }
            }
            _ = stop.changed() => break,
        }
    }
    debug!("Node status monitor stopped");
}
