//! Domain layer for the transport: framing, write queues and config.

pub mod codec;
pub mod entities;
pub mod errors;
pub mod write_queue;

pub use codec::{FrameCodec, DEFAULT_MAX_FRAME_SIZE};
pub use entities::{BootstrapConfig, ShutdownRequest, TransportConfig, DEFAULT_PORT};
pub use errors::TransportError;
pub use write_queue::WriteQueue;
