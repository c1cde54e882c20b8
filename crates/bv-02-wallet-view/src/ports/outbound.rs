//! # Outbound Ports
//!
//! A view reads the chain through `ChainStore`, the mempool through the
//! zero-conf engine's `ZeroConfApi`, talks to the node through `NodeFeed`
//! and reports through the event bus.

pub use bv_01_zero_conf::ports::ZeroConfApi;
pub use shared_bus::EventPublisher;
pub use shared_types::ports::{ChainStore, NodeFeed};
