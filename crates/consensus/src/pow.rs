//! Proof of Work acceptance test.
//!
//! A block is valid when its digest, read as a big-endian unsigned integer,
//! is strictly less than the block's target. Lower targets mean more work.

use forgechain_core::Hash;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Leading zero bits of the default starting target.
pub const DEFAULT_LEADING_ZEROES: u32 = 15;

/// Desired milliseconds between blocks.
pub const DEFAULT_BLOCK_INTERVAL: u64 = 10_000;

/// Errors in proof-of-work parameters.
#[derive(Debug, Error)]
pub enum PowError {
    #[error("target must be greater than zero")]
    ZeroTarget,

    #[error("block interval must be greater than zero")]
    ZeroInterval,

    #[error("invalid target encoding: {0}")]
    InvalidTarget(String),
}

pub type Result<T> = std::result::Result<T, PowError>;

/// `(2^256 - 1) >> DEFAULT_LEADING_ZEROES`.
pub fn default_target() -> BigUint {
    let max = (BigUint::one() << 256u32) - BigUint::one();
    max >> DEFAULT_LEADING_ZEROES
}

/// Read a digest as a big-endian integer.
pub fn hash_to_int(hash: &Hash) -> BigUint {
    BigUint::from_bytes_be(hash.as_bytes())
}

/// Strict `digest < target`.
pub fn meets_target(hash: &Hash, target: &BigUint) -> bool {
    hash_to_int(hash) < *target
}

/// Parse a target from hex, with or without `0x`.
pub fn target_from_hex(s: &str) -> Result<BigUint> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| PowError::InvalidTarget(s.to_string()))
}

/// Lowercase hex of a target, no prefix.
pub fn target_to_hex(target: &BigUint) -> String {
    target.to_str_radix(16)
}

/// Proof of Work configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowConfig {
    /// Desired time between blocks, in milliseconds.
    pub block_interval: u64,
    /// Target of the first block; later blocks derive theirs by retargeting.
    #[serde(with = "target_serde")]
    pub initial_target: BigUint,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            block_interval: DEFAULT_BLOCK_INTERVAL,
            initial_target: default_target(),
        }
    }
}

impl PowConfig {
    /// Create a configuration with the given interval and starting target.
    pub fn new(block_interval: u64, initial_target: BigUint) -> Self {
        Self {
            block_interval,
            initial_target,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_interval == 0 {
            return Err(PowError::ZeroInterval);
        }
        if self.initial_target.is_zero() {
            return Err(PowError::ZeroTarget);
        }
        Ok(())
    }
}

/// Targets travel as hex strings in config files.
mod target_serde {
    use super::*;

    pub fn serialize<S: Serializer>(
        target: &BigUint,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&target_to_hex(target))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<BigUint, D::Error> {
        let s = String::deserialize(deserializer)?;
        target_from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Something a miner can vary a proof on.
///
/// Implementors must be frozen apart from the proof while a search runs;
/// each worker mines its own clone.
pub trait Minable: Clone + Send + Sync {
    /// Set the candidate proof.
    fn set_proof(&mut self, proof: u64);
    /// Digest of the canonical form with the current proof.
    fn pow_hash(&self) -> Hash;
    /// Threshold the digest must stay below.
    fn target(&self) -> &BigUint;
}
