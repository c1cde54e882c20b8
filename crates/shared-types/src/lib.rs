//! # Shared Types Crate
//!
//! Value types and collaborator ports shared by every Blockview crate.
//!
//! ## Design Principles
//!
//! - **Opaque keys over pointer graphs**: transactions and outputs are named
//!   by `TxKey` / `OutputKey` and resolved through the `ChainStore` port.
//! - **Single Source of Truth**: the raw transaction format, key layout and
//!   TxIO model live here and nowhere else.
//! - **Collaborators at the boundary**: the Chain Store and Node Feed are
//!   traits; `memory` holds the in-process reference implementations.

pub mod encoding;
pub mod entities;
pub mod errors;
pub mod keys;
pub mod ledger;
pub mod memory;
pub mod ports;
pub mod tx;
pub mod txio;

pub use entities::*;
pub use errors::*;
pub use keys::{OutputKey, TxKey, UNCONFIRMED_HEIGHT};
pub use ledger::LedgerEntry;
pub use ports::*;
pub use tx::{Transaction, TxBuilder, TxIn, TxOut};
pub use txio::TxIoPair;
