//! Ports layer for wallet views.
//!
//! - Inbound (Driving) ports: the query API sessions dispatch to
//! - Outbound (Driven) ports: chain, node, mempool and event bus

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
