//! # Zero-Conf Engine
//!
//! Tracks unconfirmed transactions announced by the node or broadcast by
//! clients, resolves their inputs against the chain and against each
//! other, and publishes the result as an immutable [`MempoolSnapshot`].
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Zero-conf keys strictly increase, never reused | `service/engine.rs` - `queue_batch()` |
//! | Readers never see a partial update | `service/actor.rs` - one `send_replace` per batch |
//! | One spender per outpoint, newcomer wins | `service/actor.rs` - `parse_batch()` eviction |
//! | Batch and purge apply in submission order | `service/actor.rs` - `run()` |
//! | Purge partitions the pool into mined / invalidated / kept | `domain/purge.rs` |
//! | Broadcast failure reported at most once | `service/engine.rs` - `fail_broadcast()` |
//!
//! ## Transaction Lifecycle
//!
//! ```text
//!                    ┌──→ [RESOLVED] ──block──→ [MINED] (removed, key remapped)
//!                    │        └──conflict / reorg──→ removed
//! [UNINITIALIZED] ───┼──→ [RESOLVE_AGAIN] ──parent resolves──→ [RESOLVED]
//!                    ├──→ [UNRESOLVED] ──parked, retried──→ dropped after N passes
//!                    └──→ [INVALID] (rejected)
//! ```
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service/engine.rs - ZeroConfEngine (front half, fetch pool)    │
//! │  service/actor.rs  - single-writer actor                        │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - ZeroConfApi trait                          │
//! │  ports/outbound.rs - ChainStore, NodeFeed, ZcInterest, TimeSource│
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/entities.rs - ParsedTx, ZeroConfConfig                  │
//! │  domain/batch.rs    - ZcBatch with shared completion counter    │
//! │  domain/resolver.rs - multi-pass input resolution               │
//! │  domain/snapshot.rs - MempoolSnapshot, SnapshotBuilder          │
//! │  domain/purge.rs    - new-block / reorg purge                   │
//! │  domain/errors.rs   - ZeroConfError                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    MempoolSnapshot, ParsedTx, ParsedTxState, PurgeResult, ZcOutput, ZeroConfConfig,
    ZeroConfError,
};
pub use ports::{SystemTimeSource, TimeSource, ZcInterest, ZeroConfApi};
pub use service::{EngineStats, ZeroConfEngine};
