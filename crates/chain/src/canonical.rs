//! Canonical block form: the exact JSON that is hashed and sent on the wire.
//!
//! Field names and order are fixed. Ledger state never appears, except the
//! first block's balances, which bootstrap the initial supply.

use forgechain_core::{Address, Hash, Transaction};
use serde::{Deserialize, Serialize};

/// Canonical form of the first block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GenesisForm {
    pub chain_length: u64,
    pub timestamp: u64,
    pub balances: Vec<(Address, u64)>,
}

/// Canonical form of every later block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SuccessorForm {
    pub chain_length: u64,
    pub timestamp: u64,
    pub transactions: Vec<(String, Transaction)>,
    pub prev_block_hash: Option<Hash>,
    pub proof: Option<u64>,
    pub reward_addr: Option<Address>,
}

/// Either canonical shape; the JSON carries no tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CanonicalBlock {
    Genesis(GenesisForm),
    Successor(SuccessorForm),
}

impl CanonicalBlock {
    pub fn chain_length(&self) -> u64 {
        match self {
            CanonicalBlock::Genesis(form) => form.chain_length,
            CanonicalBlock::Successor(form) => form.chain_length,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
