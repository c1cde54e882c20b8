//! # Blockview Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (codec, packets, mempool)
//! └── src/integration/  # Cross-crate scenarios over a running node
//!     ├── fixtures.rs   # TestNode: runtime on an ephemeral port + helpers
//!     ├── zero_conf_flows.rs
//!     └── session_flows.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p bv-tests
//!
//! # By category
//! cargo test -p bv-tests integration::zero_conf_flows::
//! cargo test -p bv-tests integration::session_flows::
//!
//! # Benchmarks
//! cargo bench -p bv-tests
//! ```

pub mod integration;
