//! Ports layer for the transport.
//!
//! - Outbound (Driven) ports: the session table that owns registered
//!   connections. The transport implements `OutboundSink` with its
//!   per-connection write queue.

pub use bv_03_session::{OutboundSink, SessionApi};
