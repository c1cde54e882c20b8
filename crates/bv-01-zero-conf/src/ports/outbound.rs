//! # Outbound Ports
//!
//! What the engine needs from the rest of the node. The Chain Store and
//! Node Feed ports are shared with the other crates and re-exported here.

pub use shared_types::ports::{ChainStore, NodeFeed};
use shared_types::entities::ScrAddr;

/// Which sessions watch which addresses.
///
/// Implemented by the wallet view's address filter, the single source of
/// truth for "is this address watched".
pub trait ZcInterest: Send + Sync {
    /// Sessions with a wallet tracking `addr`.
    fn sessions_for(&self, addr: &ScrAddr) -> Vec<String>;

    /// At least one address is watched by someone.
    fn has_watched(&self) -> bool;
}

/// Time source for first-seen timestamps.
pub trait TimeSource: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> u32;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u32 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32
    }
}

/// Mock interest for testing.
#[cfg(test)]
#[derive(Default)]
pub struct MockInterest {
    watched: parking_lot::RwLock<std::collections::HashMap<ScrAddr, Vec<String>>>,
}

#[cfg(test)]
impl MockInterest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watch(self, addr: ScrAddr, session: &str) -> Self {
        self.watch(addr, session);
        self
    }

    pub fn watch(&self, addr: ScrAddr, session: &str) {
        self.watched
            .write()
            .entry(addr)
            .or_default()
            .push(session.to_string());
    }
}

#[cfg(test)]
impl ZcInterest for MockInterest {
    fn sessions_for(&self, addr: &ScrAddr) -> Vec<String> {
        self.watched.read().get(addr).cloned().unwrap_or_default()
    }

    fn has_watched(&self) -> bool {
        !self.watched.read().is_empty()
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
pub struct MockTimeSource {
    time: std::sync::atomic::AtomicU32,
}

#[cfg(test)]
impl MockTimeSource {
    pub fn new(initial: u32) -> Self {
        Self {
            time: std::sync::atomic::AtomicU32::new(initial),
        }
    }

    pub fn advance(&self, secs: u32) {
        self.time.fetch_add(secs, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl TimeSource for MockTimeSource {
    fn now(&self) -> u32 {
        self.time.load(std::sync::atomic::Ordering::SeqCst)
    }
}
