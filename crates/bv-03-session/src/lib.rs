//! # Session Engine
//!
//! Per-connection protocol state: packet reassembly, command decoding and
//! dispatch to the session's wallet view, and notification fan-out from
//! the shared bus.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | One handler at a time per session | `service/session.rs` - mailbox actor `run()` |
//! | Queries wait for outstanding registrations | `service/session.rs` - `on_packet()` |
//! | A handler error is a response, never fatal | `service/session.rs` - `Response::from_error` |
//! | Responses echo the request's message id | `service/session.rs` - `reply()` |
//! | Pushes carry the callback id | `domain/packet.rs` - `CALLBACK_ID` |
//! | A fragment gap never blocks other messages | `domain/reassembly.rs` |
//! | Writes after disconnect are discarded | `ports/outbound.rs` - `OutboundSink::send` |
//!
//! ## Session States
//!
//! ```text
//! open ──→ Registering ──batches acked──→ Ready ──UnregisterBdv / close──→ Closed
//!              ↑                            │
//!              └──── RegisterWallet ────────┘
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service/manager.rs - SessionManager (session table, dispatcher)│
//! │  service/session.rs - per-session mailbox actor                 │
//! │  service/handler.rs - Request → WalletViewApi                   │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - SessionApi trait                           │
//! │  ports/outbound.rs - OutboundSink trait                         │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/packet.rs     - Packet, fragment()                      │
//! │  domain/reassembly.rs - Reassembler                             │
//! │  domain/command.rs    - CommandEnvelope, Command, Request       │
//! │  domain/message.rs    - Response, Notification, ServerMessage   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    decode_envelope, encode_envelope, fragment, method, Command, CommandEnvelope, Notification,
    Packet, PacketError, Reassembler, Registration, Request, Response, ServerMessage,
    SessionConfig, SessionError, StaticRequest, CALLBACK_ID, DEFAULT_PACKET_SIZE,
};
pub use ports::{OutboundSink, SessionApi};
pub use service::SessionManager;
