//! # Genesis Module
//!
//! Seeds the in-memory Chain Store the node serves in standalone mode.
//!
//! ## Genesis Block
//!
//! - Height: 0
//! - Parent hash: 32 zero bytes
//! - One coinbase per configured payout, in order
//! - Timestamp: configured, or the current time

pub mod builder;

pub use builder::{GenesisBuilder, GenesisConfig, GenesisError};
