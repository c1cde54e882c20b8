//! # Blockview Node Runtime
//!
//! Wires the indexer together and runs it.
//!
//! ## Modular Structure
//!
//! - `container/` - Configuration and the component container
//! - `genesis/` - Genesis block for the standalone in-memory chain
//! - `handlers/` - Chain tip, inventory and node status handling
//! - `runtime` - Startup and shutdown lifecycle
//!
//! ## Event Flow
//!
//! ```text
//! ChainHandler ──NewBlock──→ Event Bus ←──ZeroConf/Error── ZeroConf engine
//!                               │   ↑
//!                               │   └──Ready/Refresh── wallet views
//!                               ↓
//!                     session dispatcher ──→ session mailboxes ──→ transport
//! ```

pub mod container;
pub mod genesis;
pub mod handlers;
pub mod runtime;

pub use container::{ConfigError, NodeConfig, NodeContainer};
pub use runtime::NodeRuntime;
