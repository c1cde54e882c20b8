//! # Session Manager
//!
//! The session table. Opens sessions for bootstrapped connections, feeds
//! their mailboxes, and routes bus events to one session or to all.

use super::session::{Mail, Session, SessionTable};
use crate::domain::{SessionConfig, SessionError};
use crate::ports::{OutboundSink, SessionApi};
use bv_02_wallet_view::{ViewContext, WalletView};
use dashmap::DashMap;
use shared_bus::{IndexerEvent, Subscription, Target};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Clone)]
pub struct SessionManager {
    config: SessionConfig,
    ctx: ViewContext,
    sessions: SessionTable,
}

impl SessionManager {
    pub fn new(config: SessionConfig, ctx: ViewContext) -> Self {
        Self {
            config,
            ctx,
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Forward every event of `subscription` to its target sessions.
    pub fn start_dispatcher(&self, mut subscription: Subscription) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                manager.route(event);
            }
            debug!("Event dispatcher stopped");
        })
    }

    /// Post `event` to its target. Returns the number of sessions reached.
    pub fn route(&self, event: IndexerEvent) -> usize {
        match event.target() {
            Target::Session(id) => match self.sessions.get(id) {
                Some(handle) => usize::from(handle.post(Mail::Event(event.clone()))),
                None => {
                    debug!(session_id = %id, "Event for unknown session dropped");
                    0
                }
            },
            Target::Broadcast => {
                let handles: Vec<_> = self.sessions.iter().map(|e| e.value().clone()).collect();
                handles
                    .iter()
                    .filter(|handle| handle.post(Mail::Event(event.clone())))
                    .count()
            }
        }
    }

    /// Highest number of handlers seen running at once for a session.
    pub fn max_in_flight(&self, session_id: &str) -> Option<usize> {
        self.sessions
            .get(session_id)
            .map(|handle| handle.shared.in_flight.max())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Close every session.
    pub fn shutdown(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        info!(count = ids.len(), "Closing all sessions");
        for id in ids {
            SessionApi::close(self, &id);
        }
    }
}

impl SessionApi for SessionManager {
    fn open(&self, sink: Arc<dyn OutboundSink>) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let view = WalletView::new(id.clone(), self.config.view.clone(), self.ctx.clone());
        Session::spawn(id.clone(), view, sink, &self.config, Arc::clone(&self.sessions));
        id
    }

    fn deliver(&self, session_id: &str, packet: Vec<u8>) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))?;
        if handle.post(Mail::Packet(packet)) {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }

    fn close(&self, session_id: &str) {
        if let Some((_, handle)) = self.sessions.remove(session_id) {
            handle.close();
            debug!(session_id, "Session close requested");
        }
    }

    fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
