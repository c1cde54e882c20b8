//! # Transport Client
//!
//! Minimal client side of the protocol: frames, fragments and correlates
//! requests with responses, and buffers notifications that arrive in
//! between.

use crate::domain::{FrameCodec, TransportError};
use bv_03_session::{
    encode_envelope, fragment, method, CommandEnvelope, Notification, Packet, Reassembler,
    Response, ServerMessage, CALLBACK_ID, DEFAULT_PACKET_SIZE,
};
use futures::{SinkExt, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

pub struct TransportClient {
    framed: Framed<TcpStream, FrameCodec>,
    reassembler: Reassembler,
    packet_size: usize,
    next_msg: u32,
    session_id: Option<String>,
    notifications: VecDeque<Notification>,
    /// Responses read while waiting for another message id.
    responses: HashMap<u32, Response>,
}

impl TransportClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, FrameCodec::default()),
            reassembler: Reassembler::default(),
            packet_size: DEFAULT_PACKET_SIZE,
            next_msg: 0,
            session_id: None,
            notifications: VecDeque::new(),
            responses: HashMap::new(),
        })
    }

    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Bootstrap handshake; returns the new session id.
    pub async fn register(&mut self, magic: &[u8]) -> Result<String, TransportError> {
        let mut envelope = CommandEnvelope::new(method::REGISTER_BDV);
        envelope.bin_args.push(magic.to_vec());
        match self.call(envelope).await? {
            Response::Id(session_id) => {
                self.session_id = Some(session_id.clone());
                Ok(session_id)
            }
            Response::Error { code, message } => Err(TransportError::Rejected { code, message }),
            _ => Err(TransportError::UnexpectedMessage),
        }
    }

    /// Send a command and wait for its response. The session id is filled
    /// in once registered.
    pub async fn call(&mut self, envelope: CommandEnvelope) -> Result<Response, TransportError> {
        let msg_id = self.send(envelope).await?;
        self.response(msg_id).await
    }

    /// Send a command without waiting; returns its message id.
    pub async fn send(&mut self, mut envelope: CommandEnvelope) -> Result<u32, TransportError> {
        if envelope.session_id.is_none() {
            envelope.session_id = self.session_id.clone();
        }
        let message = encode_envelope(&envelope)?;
        self.next_msg = self.next_msg.wrapping_add(1) % CALLBACK_ID;
        let msg_id = self.next_msg;
        for packet in fragment(msg_id, &message, self.packet_size)? {
            self.framed.send(packet.encode()).await?;
        }
        Ok(msg_id)
    }

    /// Response to `msg_id`, buffering anything else that arrives first.
    pub async fn response(&mut self, msg_id: u32) -> Result<Response, TransportError> {
        loop {
            if let Some(response) = self.responses.remove(&msg_id) {
                return Ok(response);
            }
            self.read_message().await?;
        }
    }

    pub async fn next_notification(&mut self) -> Result<Notification, TransportError> {
        loop {
            if let Some(notification) = self.notifications.pop_front() {
                return Ok(notification);
            }
            self.read_message().await?;
        }
    }

    async fn read_message(&mut self) -> Result<(), TransportError> {
        loop {
            let frame = self
                .framed
                .next()
                .await
                .ok_or(TransportError::ConnectionClosed)??;
            let Some((msg_id, bytes)) = self.reassembler.push(Packet::decode(&frame)?)? else {
                continue;
            };
            match ServerMessage::decode(&bytes)? {
                ServerMessage::Notification(notification) if msg_id == CALLBACK_ID => {
                    self.notifications.push_back(notification);
                }
                ServerMessage::Response(response) if msg_id != CALLBACK_ID => {
                    self.responses.insert(msg_id, response);
                }
                _ => return Err(TransportError::UnexpectedMessage),
            }
            return Ok(());
        }
    }
}
