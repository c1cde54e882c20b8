//! # Indexer Events
//!
//! Every event that flows through the shared bus. The ZeroConf engine, the
//! block handler and the wallet views publish; the session dispatcher
//! subscribes and routes each event to one session or to all of them.

use serde::{Deserialize, Serialize};
use shared_types::entities::{Hash, ScrAddr};
use shared_types::keys::TxKey;
use shared_types::ports::NodeStatus;

/// Codes carried by `IndexerEvent::Error`.
pub mod error_codes {
    /// The node refused a broadcast transaction.
    pub const ZC_BROADCAST_REJECTED: i32 = -30_001;
    /// A broadcast transaction never reached the mempool.
    pub const ZC_BROADCAST_TIMEOUT: i32 = -30_002;
    /// A broadcast transaction conflicts with the chain.
    pub const ZC_BROADCAST_INVALID: i32 = -30_003;
}

/// Where an event should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// Every live session.
    Broadcast,
    /// One session, by id.
    Session(&'a str),
}

/// What a `Refresh` event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshType {
    /// Address registration batches completed; ids are registration ids.
    Registration,
    /// A ledger filter or wallet selection changed.
    Filter,
    /// Everything should be reloaded.
    Full,
}

/// Everything a producer can push towards client sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndexerEvent {
    // =========================================================================
    // CHAIN
    // =========================================================================
    /// The chain tip moved. Published after the mempool purge for this tip
    /// completed.
    NewBlock {
        /// New top height.
        height: u32,
        /// First height whose contents changed.
        scan_from: u32,
        /// Last common block when the previous top was unwound.
        branch_height: Option<u32>,
        /// Zero-conf keys dropped by the purge.
        invalidated_zc: Vec<TxKey>,
        /// Zero-conf keys promoted to confirmed keys.
        mined_zc: Vec<(TxKey, TxKey)>,
    },

    // =========================================================================
    // ZERO-CONF
    // =========================================================================
    /// The mempool snapshot changed in a way that touches this session's
    /// watched addresses.
    ZeroConf {
        session_id: String,
        /// Newly accepted zero-conf keys.
        new_keys: Vec<TxKey>,
        /// Keys dropped by replacement.
        invalidated: Vec<TxKey>,
        /// Watched addresses touched by either set.
        addresses: Vec<ScrAddr>,
    },

    // =========================================================================
    // WALLETS
    // =========================================================================
    /// The session's view finished its initial scan.
    Ready { session_id: String, height: u32 },

    /// The session's view changed outside of chain or mempool activity.
    Refresh {
        session_id: String,
        refresh_type: RefreshType,
        ids: Vec<String>,
    },

    // =========================================================================
    // NODE
    // =========================================================================
    /// Node connectivity or sync state changed.
    NodeStatus(NodeStatus),

    /// Progress of a long-running scan.
    Progress {
        phase: u32,
        progress: f32,
        seconds_remaining: u32,
        numeric_progress: u32,
    },

    // =========================================================================
    // ERRORS
    // =========================================================================
    /// An error to surface to a client. An empty `session_id` broadcasts.
    Error {
        session_id: String,
        message: String,
        code: i32,
        tx_hash: Option<Hash>,
    },
}

impl IndexerEvent {
    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::NewBlock { .. } => EventTopic::Chain,
            Self::ZeroConf { .. } => EventTopic::ZeroConf,
            Self::Ready { .. } | Self::Refresh { .. } => EventTopic::Wallet,
            Self::NodeStatus(_) | Self::Progress { .. } => EventTopic::Node,
            Self::Error { .. } => EventTopic::Errors,
        }
    }

    /// Delivery target of this event.
    #[must_use]
    pub fn target(&self) -> Target<'_> {
        let id = match self {
            Self::ZeroConf { session_id, .. }
            | Self::Ready { session_id, .. }
            | Self::Refresh { session_id, .. }
            | Self::Error { session_id, .. } => session_id.as_str(),
            Self::NewBlock { .. } | Self::NodeStatus(_) | Self::Progress { .. } => "",
        };
        if id.is_empty() {
            Target::Broadcast
        } else {
            Target::Session(id)
        }
    }
}

/// Coarse grouping of events, used by subscriptions to skip what they ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// New blocks and reorgs.
    Chain,
    /// Mempool changes.
    ZeroConf,
    /// Per-session view changes.
    Wallet,
    /// Node status and progress.
    Node,
    /// Errors surfaced to clients.
    Errors,
    /// Wildcard.
    All,
}

/// Topic whitelist; an empty list lets everything through.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    #[must_use]
    pub fn matches(&self, event: &IndexerEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
