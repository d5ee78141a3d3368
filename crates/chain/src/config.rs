//! Chain parameters, loadable from TOML.
//!
//! ```toml
//! max_transactions_per_block = 8
//! coinbase_reward = 25
//!
//! [pow]
//! block_interval = 10000
//! initial_target = "1ffffffffffff..."
//! ```
//!
//! Every key is optional and falls back to the default.

use forgechain_consensus::{PowConfig, PowError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Transactions a block may hold.
pub const DEFAULT_MAX_TRANSACTIONS_PER_BLOCK: usize = 8;

/// Amount credited to a block's miner.
pub const DEFAULT_COINBASE_REWARD: u64 = 25;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid proof-of-work settings: {0}")]
    Pow(#[from] PowError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Chain configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Maximum transactions per block.
    pub max_transactions_per_block: usize,
    /// Reward for mining a block.
    pub coinbase_reward: u64,
    /// Proof of Work settings.
    pub pow: PowConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_transactions_per_block: DEFAULT_MAX_TRANSACTIONS_PER_BLOCK,
            coinbase_reward: DEFAULT_COINBASE_REWARD,
            pow: PowConfig::default(),
        }
    }
}

impl ChainConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_transactions_per_block == 0 {
            return Err(ConfigError::Invalid(
                "max_transactions_per_block must be greater than zero".to_string(),
            ));
        }
        self.pow.validate()?;
        Ok(())
    }
}
