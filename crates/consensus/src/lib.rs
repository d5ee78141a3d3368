//! Proof of Work consensus for forgechain.
//!
//! This crate provides:
//! - The acceptance test (digest below target) and target encoding
//! - Per-block difficulty retargeting on exact integer arithmetic
//! - A cancellable, multi-worker proof search
//!
//! # Example
//!
//! ```rust,no_run
//! use forgechain_consensus::{difficulty, PowConfig};
//!
//! let config = PowConfig::default();
//! let next = difficulty::next_target(0, 4_000, &config.initial_target, config.block_interval);
//! assert!(next < config.initial_target);
//! ```

pub mod difficulty;
pub mod miner;
pub mod pow;

// Re-export commonly used types
pub use difficulty::next_target;
pub use miner::{Miner, MiningOutcome};
pub use pow::{
    default_target, hash_to_int, meets_target, target_from_hex, target_to_hex, Minable,
    PowConfig, PowError, DEFAULT_BLOCK_INTERVAL, DEFAULT_LEADING_ZEROES,
};
