//! Ports layer for the session engine.
//!
//! - Inbound (Driving) ports: the session table API used by the transport
//! - Outbound (Driven) ports: the per-connection write queue

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
