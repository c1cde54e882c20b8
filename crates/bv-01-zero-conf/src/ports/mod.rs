//! Ports layer for the zero-conf engine.
//!
//! - Inbound (Driving) ports: the engine API used by sessions and the runtime
//! - Outbound (Driven) ports: chain, node, address interest and clock

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
