//! # Session Actor
//!
//! One task per session drains the session's mailbox, so packets and bus
//! events for a session are handled one at a time, in arrival order, while
//! different sessions run in parallel on the runtime's worker pool.
//!
//! ```text
//! transport ──Packet──┐
//!                     ├──► mailbox ──► actor ──► view ──► sink
//! dispatcher ─Event───┘
//! ```

use super::handler;
use crate::domain::{
    decode_envelope, fragment, Command, Notification, Packet, Reassembler, Request, Response,
    ServerMessage, SessionConfig, SessionError, CALLBACK_ID,
};
use crate::ports::OutboundSink;
use bv_02_wallet_view::{ScanNotification, WalletView, WalletViewApi};
use dashmap::DashMap;
use shared_bus::IndexerEvent;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub(crate) type SessionTable = Arc<DashMap<String, SessionHandle>>;

pub(crate) enum Mail {
    Packet(Vec<u8>),
    Event(IndexerEvent),
    Close,
}

/// Number of handlers running for one session, and the highest seen.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

struct InFlightGuard<'a>(&'a InFlight);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub in_flight: InFlight,
    /// Set on disconnect; queued mail is dropped unhandled.
    closed: AtomicBool,
}

#[derive(Clone)]
pub(crate) struct SessionHandle {
    mailbox: mpsc::UnboundedSender<Mail>,
    pub shared: Arc<Shared>,
}

impl SessionHandle {
    /// Returns `false` once the actor has exited.
    pub fn post(&self, mail: Mail) -> bool {
        self.mailbox.send(mail).is_ok()
    }

    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        let _ = self.mailbox.send(Mail::Close);
    }
}

pub(crate) struct Session {
    id: String,
    view: WalletView,
    sink: Arc<dyn OutboundSink>,
    reassembler: Reassembler,
    packet_size: usize,
    shared: Arc<Shared>,
    table: SessionTable,
}

impl Session {
    /// Register a new session in `table` and start its actor.
    pub fn spawn(
        id: String,
        view: WalletView,
        sink: Arc<dyn OutboundSink>,
        config: &SessionConfig,
        table: SessionTable,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let handle = SessionHandle {
            mailbox: tx,
            shared: Arc::clone(&shared),
        };
        table.insert(id.clone(), handle.clone());

        let session = Self {
            id,
            view,
            sink,
            reassembler: Reassembler::with_byte_limit(
                config.max_partial_messages,
                config.max_buffered_bytes,
            ),
            packet_size: config.packet_size,
            shared,
            table,
        };
        tokio::spawn(session.run(rx));
        handle
    }

    async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<Mail>) {
        info!(session_id = %self.id, "Session opened");
        let shared = Arc::clone(&self.shared);
        while let Some(mail) = mailbox.recv().await {
            if shared.closed.load(Ordering::SeqCst) {
                break;
            }
            let _guard = shared.in_flight.enter();
            let keep_running = match mail {
                Mail::Packet(bytes) => self.on_packet(bytes).await,
                Mail::Event(event) => {
                    self.on_event(event);
                    true
                }
                Mail::Close => false,
            };
            if !keep_running {
                break;
            }
        }
        self.view.close();
        self.table.remove(&self.id);
        info!(session_id = %self.id, "Session closed");
    }

    /// Returns `false` when the session should end.
    async fn on_packet(&mut self, bytes: Vec<u8>) -> bool {
        let whole = Packet::decode(&bytes).and_then(|packet| self.reassembler.push(packet));
        let (msg_id, message) = match whole {
            Ok(Some(whole)) => whole,
            Ok(None) => return true,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Dropping packet");
                return true;
            }
        };

        let request = match self.parse(&message) {
            Ok(request) => request,
            Err(e) => {
                debug!(session_id = %self.id, msg_id, error = %e, "Rejected command");
                self.reply(msg_id, Response::from_error(&e));
                return true;
            }
        };

        let method = request.name();
        let unregister = matches!(request, Request::UnregisterBdv);
        if !request.is_registration() && self.view.is_registering() {
            debug!(session_id = %self.id, method, "Waiting for address registration");
            self.view.registrations_settled().await;
        }

        debug!(session_id = %self.id, msg_id, method, "Executing command");
        let response = match handler::execute(&self.view, request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(session_id = %self.id, msg_id, method, error = %e, "Command failed");
                Response::from_error(&e)
            }
        };
        if unregister {
            // later frames on the connection go back to bootstrap
            self.table.remove(&self.id);
        }
        self.reply(msg_id, response);
        !unregister
    }

    fn parse(&self, message: &[u8]) -> Result<Request, SessionError> {
        match Command::try_from(decode_envelope(message)?)? {
            Command::Session {
                session_id,
                request,
            } if session_id == self.id => Ok(request),
            Command::Session { session_id, .. } => Err(SessionError::UnknownSession(session_id)),
            Command::Static(_) => Err(SessionError::InvalidRequest(
                "bootstrap command on a registered session".into(),
            )),
        }
    }

    fn on_event(&mut self, event: IndexerEvent) {
        let notification = match event {
            IndexerEvent::NewBlock {
                height,
                scan_from,
                branch_height,
                invalidated_zc,
                ..
            } => {
                if !self.view.is_ready() {
                    return;
                }
                self.view.scan_wallets(&ScanNotification::NewBlock {
                    scan_from,
                    invalidated_zc: invalidated_zc.clone(),
                });
                Notification::NewBlock {
                    height,
                    branch_height,
                    invalidated: invalidated_zc,
                }
            }
            IndexerEvent::ZeroConf {
                new_keys,
                invalidated,
                addresses,
                ..
            } => {
                // the initial scan picks these up
                if !self.view.is_ready() {
                    debug!(session_id = %self.id, "Zero-conf update before GoOnline");
                    return;
                }
                self.view.scan_wallets(&ScanNotification::ZeroConf {
                    addresses,
                    invalidated: invalidated.clone(),
                });
                Notification::ZeroConf {
                    entries: self.view.zero_conf_entries(&new_keys),
                    invalidated,
                }
            }
            IndexerEvent::Ready { height, .. } => Notification::Ready { height },
            IndexerEvent::Refresh {
                refresh_type, ids, ..
            } => Notification::Refresh { refresh_type, ids },
            IndexerEvent::NodeStatus(status) => Notification::NodeStatus(status),
            IndexerEvent::Progress {
                phase,
                progress,
                seconds_remaining,
                numeric_progress,
            } => Notification::Progress {
                phase,
                progress,
                seconds_remaining,
                numeric_progress,
            },
            IndexerEvent::Error {
                message,
                code,
                tx_hash,
                ..
            } => Notification::Error {
                message,
                code,
                tx_hash,
            },
        };
        self.write(CALLBACK_ID, &ServerMessage::Notification(notification));
    }

    fn reply(&self, msg_id: u32, response: Response) {
        self.write(msg_id, &ServerMessage::Response(response));
    }

    fn write(&self, msg_id: u32, message: &ServerMessage) {
        let packets = match message
            .encode()
            .and_then(|bytes| fragment(msg_id, &bytes, self.packet_size))
        {
            Ok(packets) => packets,
            Err(e) => {
                warn!(session_id = %self.id, msg_id, error = %e, "Failed to encode message");
                return;
            }
        };
        let frames = packets.iter().map(Packet::encode).collect();
        if !self.sink.send(frames) {
            debug!(session_id = %self.id, msg_id, "Connection gone, message discarded");
        }
    }
}
