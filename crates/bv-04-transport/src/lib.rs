//! # Transport
//!
//! Socket multiplexer between clients and the session engine. Each TCP
//! connection gets a random id, a write queue and a reader and a writer
//! task; unregistered connections are served by the bootstrap handler.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Oversized frames close the connection | `domain/codec.rs` - `FrameCodec::decode()` |
//! | Frames of one connection are routed in order | `service/server.rs` - `dispatch()` |
//! | Messages leave a connection whole and in FIFO order | `domain/write_queue.rs` |
//! | Only static commands before registration | `service/bootstrap.rs` |
//! | Closing a connection closes its session | `service/server.rs` - `close_connection()` |
//! | Frames for unknown connections are dropped | `service/server.rs` - `route()` |
//!
//! ## Module Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service/server.rs    - TransportServer (accept, read, write)   │
//! │  service/bootstrap.rs - RegisterBdv, Shutdown, ShutdownNode     │
//! │  service/client.rs    - TransportClient                         │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports - SessionApi (driven), OutboundSink (implemented)        │
//! │  domain/codec.rs       - FrameCodec                             │
//! │  domain/write_queue.rs - WriteQueue                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    BootstrapConfig, FrameCodec, ShutdownRequest, TransportConfig, TransportError, WriteQueue,
    DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT,
};
pub use service::{TransportClient, TransportServer};
