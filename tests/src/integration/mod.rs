//! # Integration Tests
//!
//! Every scenario runs against a full node runtime: real TCP transport,
//! session manager, wallet views and ZeroConf engine, over the in-memory
//! Chain Store and Node Feed.

pub mod fixtures;

mod session_flows;
mod zero_conf_flows;
