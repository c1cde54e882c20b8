//! # Transport Server
//!
//! Accepts TCP connections and gives each a random connection id, a write
//! queue, a reader task and a writer task. Inbound frames are handed to a
//! small worker pool; frames of one connection always go to the same
//! worker, so they are routed in arrival order.
//!
//! ```text
//! socket ─reader─→ worker[id % n] ─→ session mailbox   (registered)
//!                                 └─→ bootstrap handler (not yet)
//! session ─→ WriteQueue ─writer─→ socket
//! ```

use super::bootstrap;
use super::connection::Connection;
use crate::domain::{
    BootstrapConfig, FrameCodec, ShutdownRequest, TransportConfig, TransportError, WriteQueue,
};
use crate::ports::SessionApi;
use bv_03_session::SessionError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use std::io::ErrorKind as IoErrorKind;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

/// Wait before retrying a write that failed transiently.
const WRITE_RETRY: Duration = Duration::from_millis(100);

struct InboundFrame {
    connection_id: u64,
    payload: Vec<u8>,
}

pub(crate) struct ServerInner {
    pub config: TransportConfig,
    pub bootstrap: BootstrapConfig,
    pub sessions: Arc<dyn SessionApi>,
    connections: DashMap<u64, Arc<Connection>>,
    workers: Vec<mpsc::UnboundedSender<InboundFrame>>,
    shutdown: watch::Sender<Option<ShutdownRequest>>,
    stopping: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct TransportServer {
    pub(crate) inner: Arc<ServerInner>,
}

impl TransportServer {
    /// Create the server and start its inbound workers.
    pub fn start(
        config: TransportConfig,
        bootstrap: BootstrapConfig,
        sessions: Arc<dyn SessionApi>,
    ) -> Self {
        let count = config.workers.max(1);
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..count).map(|_| mpsc::unbounded_channel()).unzip();
        let inner = Arc::new(ServerInner {
            config,
            bootstrap,
            sessions,
            connections: DashMap::new(),
            workers: senders,
            shutdown: watch::channel(None).0,
            stopping: watch::channel(false).0,
        });
        for (index, rx) in receivers.into_iter().enumerate() {
            tokio::spawn(run_worker(index, Arc::downgrade(&inner), rx));
        }
        debug!(workers = count, "Transport workers started");
        Self { inner }
    }

    /// Bind the configured address and accept connections until
    /// [`shutdown`](Self::shutdown). Returns the bound address.
    pub async fn listen(&self) -> Result<SocketAddr, TransportError> {
        let addr = self.inner.config.listen_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local = listener.local_addr()?;
        info!(addr = %local, "Listening for clients");

        let server = self.clone();
        let mut stopping = self.inner.stopping.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => server.accept(stream, peer),
                        Err(e) => warn!(error = %e, "Accept failed"),
                    },
                    _ = stopping.changed() => break,
                }
            }
            info!(addr = %local, "Listener stopped");
        });
        Ok(local)
    }

    fn accept(&self, stream: TcpStream, peer: SocketAddr) {
        let connection = loop {
            let id = rand::random::<u64>();
            if let Entry::Vacant(slot) = self.inner.connections.entry(id) {
                let connection = Arc::new(Connection::new(id, peer));
                slot.insert(Arc::clone(&connection));
                break connection;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(connection_id = connection.id, error = %e, "Failed to set TCP_NODELAY");
        }
        info!(connection_id = connection.id, %peer, "Connection accepted");

        let (reader, writer) = stream.into_split();
        tokio::spawn(self.clone().write_loop(Arc::clone(&connection), writer));
        tokio::spawn(self.clone().read_loop(connection, reader));
    }

    async fn read_loop(self, connection: Arc<Connection>, reader: OwnedReadHalf) {
        let id = connection.id;
        let mut frames = FramedRead::new(reader, FrameCodec::new(self.inner.config.max_frame_size));
        loop {
            tokio::select! {
                frame = frames.next() => match frame {
                    Some(Ok(payload)) => self.dispatch(InboundFrame {
                        connection_id: id,
                        payload,
                    }),
                    Some(Err(e)) => {
                        warn!(connection_id = id, error = %e, "Bad frame, closing connection");
                        break;
                    }
                    None => break,
                },
                _ = connection.closed.notified() => break,
            }
        }
        self.close_connection(id);
    }

    async fn write_loop(self, connection: Arc<Connection>, writer: OwnedWriteHalf) {
        let id = connection.id;
        let queue: &WriteQueue = &connection.queue;
        let mut sink = FramedWrite::new(writer, FrameCodec::new(self.inner.config.max_frame_size));
        loop {
            let mut stalled = false;
            while let Some(packet) = queue.pop_packet() {
                match sink.send(packet.clone()).await {
                    Ok(()) => {}
                    Err(TransportError::Io(e)) if is_transient(e.kind()) => {
                        warn!(connection_id = id, error = %e, "Partial write, retrying");
                        queue.requeue(packet);
                        stalled = true;
                        break;
                    }
                    Err(e) => {
                        warn!(connection_id = id, error = %e, "Write failed, closing connection");
                        self.close_connection(id);
                        return;
                    }
                }
            }
            if queue.is_closed() {
                break;
            }
            if stalled {
                let _ = tokio::time::timeout(WRITE_RETRY, queue.notified()).await;
            } else {
                queue.notified().await;
            }
        }
        debug!(connection_id = id, "Writer stopped");
    }

    fn dispatch(&self, frame: InboundFrame) {
        let workers = &self.inner.workers;
        let index = (frame.connection_id % workers.len() as u64) as usize;
        if workers[index].send(frame).is_err() {
            warn!(worker = index, "Inbound worker gone, frame dropped");
        }
    }

    fn route(&self, frame: InboundFrame) {
        let Some(connection) = self
            .inner
            .connections
            .get(&frame.connection_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            debug!(connection_id = frame.connection_id, "Frame for unknown connection dropped");
            return;
        };

        let Some(session_id) = connection.session_id() else {
            bootstrap::handle(self, &connection, frame.payload);
            return;
        };
        match self.inner.sessions.deliver(&session_id, frame.payload.clone()) {
            Ok(()) => {}
            Err(SessionError::UnknownSession(_) | SessionError::Closed) => {
                // the session unregistered; the connection may register again
                debug!(connection_id = connection.id, %session_id, "Session ended, back to bootstrap");
                *connection.session.lock() = None;
                bootstrap::handle(self, &connection, frame.payload);
            }
            Err(e) => {
                debug!(connection_id = connection.id, %session_id, error = %e, "Frame dropped");
            }
        }
    }

    /// Drop a connection, discard its queue and close its session.
    pub fn close_connection(&self, connection_id: u64) {
        let Some((_, connection)) = self.inner.connections.remove(&connection_id) else {
            return;
        };
        connection.queue.close();
        connection.closed.notify_one();
        if let Some(session_id) = connection.session.lock().take() {
            self.inner.sessions.close(&session_id);
        }
        info!(connection_id, peer = %connection.peer, "Connection closed");
    }

    pub(crate) fn request_shutdown(&self, request: ShutdownRequest) {
        info!(?request, "Shutdown requested");
        self.inner.shutdown.send_replace(Some(request));
    }

    /// Fires when an authenticated client asks for a shutdown.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<Option<ShutdownRequest>> {
        self.inner.shutdown.subscribe()
    }

    /// Stop accepting and close every connection.
    pub fn shutdown(&self) {
        self.inner.stopping.send_replace(true);
        let ids: Vec<u64> = self.inner.connections.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.close_connection(id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }
}

async fn run_worker(
    index: usize,
    server: Weak<ServerInner>,
    mut frames: mpsc::UnboundedReceiver<InboundFrame>,
) {
    while let Some(frame) = frames.recv().await {
        let Some(inner) = server.upgrade() else {
            break;
        };
        TransportServer { inner }.route(frame);
    }
    debug!(worker = index, "Inbound worker stopped");
}

fn is_transient(kind: IoErrorKind) -> bool {
    matches!(
        kind,
        IoErrorKind::WouldBlock | IoErrorKind::Interrupted | IoErrorKind::TimedOut
    )
}
