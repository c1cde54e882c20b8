//! # Standalone Chain Seed
//!
//! Turns a payout list into block 0 of an empty in-memory Chain Store.

use std::time::{SystemTime, UNIX_EPOCH};

use shared_types::entities::BlockHeader;
use shared_types::memory::InMemoryChainStore;
use shared_types::tx::{Transaction, TxBuilder};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenesisError {
    /// The store already holds a chain.
    #[error("Chain store is not empty")]
    AlreadyExists,

    #[error("Bad payout list: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Default)]
pub struct GenesisConfig {
    /// Unix seconds; `None` stamps the block with the seeding time.
    pub timestamp: Option<u32>,

    /// Coinbase payouts as (output script, value).
    pub payouts: Vec<(Vec<u8>, u64)>,
}

impl GenesisConfig {
    /// Every payout needs a non-empty script.
    pub fn validate(&self) -> Result<(), GenesisError> {
        if let Some((_, value)) = self.payouts.iter().find(|(script, _)| script.is_empty()) {
            return Err(GenesisError::InvalidConfig(format!(
                "payout of {value} has an empty script"
            )));
        }
        Ok(())
    }
}

pub struct GenesisBuilder {
    config: GenesisConfig,
}

impl GenesisBuilder {
    pub fn new(config: GenesisConfig) -> Self {
        Self { config }
    }

    /// The genesis transactions: one coinbase per payout.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.config
            .payouts
            .iter()
            .enumerate()
            .map(|(tag, (script, value))| {
                TxBuilder::new()
                    .coinbase(tag as u32)
                    .pay(script.clone(), *value)
                    .build()
            })
            .collect()
    }

    /// Validate, build and store the genesis block.
    pub fn seed(self, store: &InMemoryChainStore) -> Result<BlockHeader, GenesisError> {
        self.config.validate()?;
        if store.height().is_some() {
            return Err(GenesisError::AlreadyExists);
        }

        let timestamp = match self.config.timestamp {
            Some(ts) => ts,
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |since| since.as_secs() as u32),
        };
        Ok(store.push_block(self.transactions(), timestamp))
    }
}
