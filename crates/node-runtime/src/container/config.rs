//! # Node Configuration
//!
//! Everything the runtime needs to wire the indexer together. Each library
//! crate owns its own config struct; `NodeConfig` groups the operator-facing
//! knobs and converts into them.
//!
//! ## Environment Overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `BV_LISTEN_ADDR` | `network.listen_addr` |
//! | `BV_PORT` | `network.port` |
//! | `BV_NETWORK_MAGIC` | `network.magic` (hex) |
//! | `BV_COOKIE` | `security.cookie` |
//! | `BV_ZC_TIMEOUT_MS` | `zero_conf.fetch_timeout` |
//! | `BV_WORKERS` | `transport.workers` |

use bv_01_zero_conf::ZeroConfConfig;
use bv_02_wallet_view::ViewConfig;
use bv_03_session::SessionConfig;
use bv_04_transport::{BootstrapConfig, TransportConfig, DEFAULT_PORT};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Mainnet magic word.
pub const DEFAULT_NETWORK_MAGIC: [u8; 4] = [0xF9, 0xBE, 0xB4, 0xD9];

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("shutdown cookie is empty")]
    EmptyCookie,

    #[error("transport worker count must be at least 1")]
    NoWorkers,

    #[error("network magic word is empty")]
    EmptyMagic,

    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },
}

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub security: SecurityConfig,
    pub zero_conf: ZeroConfConfig,
    pub session: SessionSettings,
    pub transport: TransportSettings,
}

impl NodeConfig {
    /// Defaults with the `BV_*` environment variables applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Apply overrides read through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("BV_LISTEN_ADDR") {
            self.network.listen_addr = parse("BV_LISTEN_ADDR", value)?;
        }
        if let Some(value) = lookup("BV_PORT") {
            self.network.port = parse("BV_PORT", value)?;
        }
        if let Some(value) = lookup("BV_NETWORK_MAGIC") {
            self.network.magic = hex::decode(value.trim()).map_err(|_| ConfigError::InvalidValue {
                var: "BV_NETWORK_MAGIC",
                value,
            })?;
        }
        if let Some(value) = lookup("BV_COOKIE") {
            self.security.cookie = value;
        }
        if let Some(value) = lookup("BV_ZC_TIMEOUT_MS") {
            let millis: u64 = parse("BV_ZC_TIMEOUT_MS", value)?;
            self.zero_conf.fetch_timeout = Duration::from_millis(millis);
        }
        if let Some(value) = lookup("BV_WORKERS") {
            self.transport.workers = parse("BV_WORKERS", value)?;
        }
        Ok(())
    }

    /// Reject configurations the node cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.cookie.is_empty() {
            return Err(ConfigError::EmptyCookie);
        }
        if self.transport.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.network.magic.is_empty() {
            return Err(ConfigError::EmptyMagic);
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.network.listen_addr, self.network.port)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            view: ViewConfig {
                page_size: self.session.page_size,
                ..ViewConfig::default()
            },
            // sessions fragment to what the transport writes
            packet_size: self.transport.packet_size,
            notification_capacity: self.session.notification_capacity,
            ..SessionConfig::default()
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            listen_addr: self.socket_addr(),
            workers: self.transport.workers,
            max_frame_size: self.transport.max_frame_size,
            packet_size: self.transport.packet_size,
        }
    }

    pub fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            network_magic: self.network.magic.clone(),
            cookie: self.security.cookie.clone(),
        }
    }
}

fn parse<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { var, value })
}

/// Client-facing network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Address to listen on.
    pub listen_addr: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Magic word clients present in `RegisterBdv`.
    pub magic: Vec<u8>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            magic: DEFAULT_NETWORK_MAGIC.to_vec(),
        }
    }
}

/// Secrets.
#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    /// Shared secret for `Shutdown` / `ShutdownNode`. Must be set.
    pub cookie: String,
}

/// Session engine knobs.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Ledger entries per history page.
    pub page_size: usize,
    /// Events buffered between the bus and the session dispatcher.
    pub notification_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            page_size: defaults.view.page_size,
            notification_capacity: defaults.notification_capacity,
        }
    }
}

/// Transport knobs.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Workers routing inbound frames.
    pub workers: usize,
    /// Largest frame accepted from a client.
    pub max_frame_size: usize,
    /// Largest packet written to a client.
    pub packet_size: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        let defaults = TransportConfig::default();
        Self {
            workers: defaults.workers,
            max_frame_size: defaults.max_frame_size,
            packet_size: defaults.packet_size,
        }
    }
}
