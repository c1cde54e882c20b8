//! # Node Runtime
//!
//! Lifecycle around a [`NodeContainer`]: starts the session dispatcher, the
//! node feed listener, the node status monitor and the transport, and tears them down in reverse.
//!
//! ## Shutdown Sequence
//!
//! 1. Stop accepting and close every connection (sessions close with them)
//! 2. Close any session left
//! 3. Stop background tasks
//! 4. Drain and stop the ZeroConf engine

use crate::container::NodeContainer;
use crate::handlers::run_status_monitor;
use anyhow::{Context, Result};
use bv_01_zero_conf::ZeroConfApi;
use bv_04_transport::{ShutdownRequest, TransportServer};
use parking_lot::Mutex;
use shared_bus::EventFilter;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// How often the node feed is polled for status changes.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct NodeRuntime {
    container: Arc<NodeContainer>,
    transport: TransportServer,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NodeRuntime {
    pub fn new(container: NodeContainer) -> Self {
        let transport = TransportServer::start(
            container.config.transport_config(),
            container.config.bootstrap_config(),
            Arc::new(container.sessions.clone()),
        );
        Self {
            container: Arc::new(container),
            transport,
            shutdown_tx: watch::channel(false).0,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start background tasks and listen for clients. Returns the bound
    /// address.
    pub async fn start(&self) -> Result<SocketAddr> {
        let container = &self.container;
        let dispatcher = container
            .sessions
            .start_dispatcher(container.bus.subscribe(EventFilter::all()));
        let monitor = tokio::spawn(run_status_monitor(
            Arc::clone(&container.feed),
            container.bus.clone(),
            STATUS_POLL_INTERVAL,
            self.shutdown_tx.subscribe(),
        ));
        let listener = tokio::spawn({
            let container = Arc::clone(container);
            let events = container.feed.subscribe();
            let stop = self.shutdown_tx.subscribe();
            async move { container.chain.listen(events, stop).await }
        });
        self.tasks.lock().extend([dispatcher, listener, monitor]);

        let addr = self
            .transport
            .listen()
            .await
            .context("Failed to bind client listener")?;
        info!(%addr, "Node runtime started");
        Ok(addr)
    }

    /// Resolves once an authenticated client asks for a shutdown.
    pub async fn shutdown_requested(&self) -> Option<ShutdownRequest> {
        let mut requests = self.transport.subscribe_shutdown();
        let request = requests.wait_for(Option::is_some).await.ok()?;
        *request
    }

    /// Shutdown the node gracefully.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        self.transport.shutdown();
        self.container.sessions.shutdown();
        self.shutdown_tx.send_replace(true);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.container.zero_conf.shutdown().await;
        info!("Shutdown complete");
    }

    pub fn container(&self) -> Arc<NodeContainer> {
        Arc::clone(&self.container)
    }

    pub fn transport(&self) -> &TransportServer {
        &self.transport
    }
}
