//! Core primitives for forgechain.
//!
//! This crate provides the types a block engine is built from:
//! - Hashing (Blake3) and hex encoding for the canonical JSON form
//! - Keys, signatures and addresses
//! - Transactions and the balance view they are checked against
//! - Merkle commitments with inclusion proofs

pub mod crypto;
pub mod encoding;
pub mod hash;
pub mod merkle;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use crypto::{Address, CryptoError, Keypair, PublicKey, Signature};
pub use hash::{hash, hash_concat, Hash, H256};
pub use merkle::{verify_proof, MerkleError, MerkleProof, MerkleTree, Side};
pub use transaction::{BalanceView, Output, Transaction};
