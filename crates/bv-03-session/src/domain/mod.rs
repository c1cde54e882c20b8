//! Domain layer for sessions: wire packets, commands and messages.

pub mod command;
pub mod entities;
pub mod errors;
pub mod message;
pub mod packet;
pub mod reassembly;

pub use command::{
    decode_envelope, encode_envelope, method, Command, CommandEnvelope, Registration, Request,
    StaticRequest,
};
pub use entities::{SessionConfig, DEFAULT_PACKET_SIZE};
pub use errors::{PacketError, SessionError};
pub use message::{Notification, Response, ServerMessage};
pub use packet::{fragment, packet_type, Packet, CALLBACK_ID};
pub use reassembly::{Reassembler, DEFAULT_MAX_BUFFERED_BYTES, DEFAULT_MAX_PARTIAL};
