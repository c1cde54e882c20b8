//! # Shared Bus - Event Bus for Indexer Notifications
//!
//! Carries every server-initiated notification from the component that
//! produces it to the session dispatcher that delivers it.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐  ZeroConf     ┌──────────────┐  subscribe()  ┌──────────────┐
//! │ ZeroConf     │ ────────────→ │              │ ────────────→ │ Session      │
//! │ Engine       │               │  Event Bus   │               │ Dispatcher   │
//! ├──────────────┤  NewBlock     │              │               │  ├─ by id    │
//! │ Block Handler│ ────────────→ │              │               │  └─ all      │
//! ├──────────────┤  Refresh      │              │               └──────────────┘
//! │ Wallet Views │ ────────────→ │              │
//! └──────────────┘               └──────────────┘
//! ```
//!
//! ## Routing
//!
//! - Events carrying a non-empty `session_id` go to that session only.
//! - Events with an empty id (or none) are broadcast to every session.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{error_codes, EventFilter, EventTopic, IndexerEvent, RefreshType, Target};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
