//! Domain layer for the zero-conf engine.

pub mod batch;
pub mod entities;
pub mod errors;
pub mod purge;
pub mod resolver;
pub mod snapshot;

pub use batch::{BatchSource, ZcBatch};
pub use entities::{ParsedTx, ParsedTxIn, ParsedTxOut, ParsedTxState, ResolvedInput, ZeroConfConfig};
pub use errors::ZeroConfError;
pub use purge::{purge, PurgeResult};
pub use resolver::{resolve_batch, ResolveStats};
pub use snapshot::{AddressTxios, MempoolSnapshot, SnapshotBuilder, ZcOutput};
