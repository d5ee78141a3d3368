//! Block engine for forgechain.
//!
//! This crate brings the primitives and consensus rules together:
//! - **Block**: transaction validation, ledger transitions, Merkle commitment
//! - **Ledger**: per-block balances and nonces, copied forward to successors
//! - **Canonical form**: the JSON that is hashed and exchanged between nodes
//! - **Config**: chain parameters loaded from TOML
//!
//! # Example
//!
//! ```rust,no_run
//! use forgechain_chain::{Block, ChainConfig};
//! use forgechain_consensus::Miner;
//! use forgechain_core::{Keypair, Transaction};
//! use std::sync::atomic::AtomicBool;
//!
//! let config = ChainConfig::default();
//! let alice = Keypair::generate();
//! let bob = Keypair::generate();
//!
//! let genesis = Block::genesis([(alice.address(), 100)], &config);
//! let mut block = Block::new(Some(alice.address()), Some(&genesis), &config);
//!
//! let tx = Transaction::transfer(alice.public_key.clone(), bob.address(), 40, 0, 1)
//!     .signed(&alice);
//! block.add_transaction(tx).unwrap();
//! block.build_commitment().unwrap();
//!
//! let cancel = AtomicBool::new(false);
//! block.mine(&Miner::new(4), &cancel);
//! assert!(block.has_valid_proof());
//!
//! let received = Block::from_json(&block.to_json().unwrap(), Some(&genesis), &config).unwrap();
//! assert_eq!(received.hash(), block.hash());
//! ```

pub mod block;
pub mod canonical;
pub mod config;
pub mod ledger;

pub use block::{current_timestamp, Block, BlockError, TxRejection};
pub use canonical::{CanonicalBlock, GenesisForm, SuccessorForm};
pub use config::{ChainConfig, ConfigError};
pub use ledger::LedgerState;
