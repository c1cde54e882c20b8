//! # Receiving Side
//!
//! A `Subscription` yields the events matching its filter. Session-targeted
//! events arrive on a lossless lane and are preferred when both lanes have
//! something ready. On the broadcast lane, falling behind is not fatal: the
//! skipped events are counted and reception resumes at the oldest event
//! still buffered.

use crate::events::{EventFilter, IndexerEvent};
use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Every publisher is gone.
    #[error("Event bus closed")]
    Closed,
}

pub struct Subscription {
    fanout: broadcast::Receiver<IndexerEvent>,
    direct: mpsc::UnboundedReceiver<IndexerEvent>,
    filter: EventFilter,
    lagged: u64,
}

impl Subscription {
    pub(crate) fn new(
        fanout: broadcast::Receiver<IndexerEvent>,
        direct: mpsc::UnboundedReceiver<IndexerEvent>,
        filter: EventFilter,
    ) -> Self {
        Self {
            fanout,
            direct,
            filter,
            lagged: 0,
        }
    }

    /// Next matching event; `None` once the bus is dropped and both lanes
    /// are drained.
    pub async fn recv(&mut self) -> Option<IndexerEvent> {
        loop {
            let event = tokio::select! {
                biased;
                Some(event) = self.direct.recv() => event,
                received = self.fanout.recv() => match received {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        self.skip(skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => return self.drain_direct().await,
                },
            };
            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Next matching event if one is already buffered.
    pub fn try_recv(&mut self) -> Result<Option<IndexerEvent>, SubscriptionError> {
        while let Ok(event) = self.direct.try_recv() {
            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
        loop {
            match self.fanout.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => self.skip(skipped),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    async fn drain_direct(&mut self) -> Option<IndexerEvent> {
        while let Some(event) = self.direct.recv().await {
            if self.filter.matches(&event) {
                return Some(event);
            }
        }
        None
    }

    fn skip(&mut self, skipped: u64) {
        self.lagged += skipped;
        warn!(skipped, total = self.lagged, "Subscription fell behind, broadcast events lost");
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Broadcast events lost to falling behind.
    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged
    }
}
