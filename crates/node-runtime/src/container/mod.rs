//! # Node Container
//!
//! Owns one instance of every component with an explicit lifetime; nothing
//! lives in a static. Components are built in dependency order:
//!
//! ```text
//! ChainStore, NodeFeed (collaborators)
//!   └─→ event bus ─→ address filter ─→ ZeroConf engine
//!         └─→ session manager (views over all of the above)
//!               └─→ transport server (built by the runtime)
//! ```

pub mod config;

pub use config::{ConfigError, NodeConfig};

use crate::handlers::ChainHandler;
use bv_01_zero_conf::ZeroConfEngine;
use bv_02_wallet_view::{AddressFilter, ViewContext};
use bv_03_session::SessionManager;
use shared_bus::InMemoryEventBus;
use shared_types::ports::{ChainStore, NodeFeed};
use std::sync::Arc;
use tracing::info;

pub struct NodeContainer {
    pub config: NodeConfig,
    pub store: Arc<dyn ChainStore>,
    pub feed: Arc<dyn NodeFeed>,
    pub bus: Arc<InMemoryEventBus>,
    pub filter: Arc<AddressFilter>,
    pub zero_conf: ZeroConfEngine,
    pub sessions: SessionManager,
    pub chain: ChainHandler,
}

impl NodeContainer {
    /// Build every component over the given collaborators. Spawns the
    /// engine and filter tasks, so it must run inside a tokio runtime.
    pub fn new(config: NodeConfig, store: Arc<dyn ChainStore>, feed: Arc<dyn NodeFeed>) -> Self {
        let session_config = config.session_config();
        let bus = Arc::new(InMemoryEventBus::with_capacity(
            session_config.notification_capacity,
        ));
        let filter = AddressFilter::start();
        let zero_conf = ZeroConfEngine::start(
            config.zero_conf.clone(),
            Arc::clone(&store),
            Arc::clone(&feed),
            bus.clone(),
            filter.clone(),
        );
        let ctx = ViewContext {
            store: Arc::clone(&store),
            feed: Arc::clone(&feed),
            zero_conf: Arc::new(zero_conf.clone()),
            publisher: bus.clone(),
            filter: filter.clone(),
        };
        let sessions = SessionManager::new(session_config, ctx);
        let chain = ChainHandler::new(
            Arc::new(zero_conf.clone()),
            bus.clone(),
            config.zero_conf.fetch_timeout,
        );
        info!(top = ?store.top_header().map(|h| h.height), "Components initialized");

        Self {
            config,
            store,
            feed,
            bus,
            filter,
            zero_conf,
            sessions,
            chain,
        }
    }
}
