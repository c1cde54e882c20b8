//! # Handlers
//!
//! Event sources feeding the indexer: chain tips, inventory and node status.

pub mod chain;

pub use chain::{run_status_monitor, ChainHandler};
