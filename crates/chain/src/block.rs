//! Blocks: the validated state-transition unit of the chain.
//!
//! A block owns a snapshot of the ledger, the transactions it accepted, and
//! its proof-of-work parameters. Ledger state is derived, never hashed: two
//! blocks with the same transactions, proof and metadata share a digest no
//! matter what history produced their balances.

use crate::canonical::{CanonicalBlock, GenesisForm, SuccessorForm};
use crate::config::ChainConfig;
use crate::ledger::LedgerState;
use forgechain_consensus::{meets_target, next_target, Minable, Miner, MiningOutcome};
use forgechain_core::{
    hash, Address, BalanceView, Hash, MerkleError, MerkleProof, MerkleTree, Transaction,
};
use num_bigint::BigUint;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a transaction was turned away. The block is unchanged in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxRejection {
    #[error("block is full ({max} transactions)")]
    BlockFull { max: usize },

    #[error("duplicate transaction {0}")]
    Duplicate(String),

    #[error("transaction {0} is not signed")]
    MissingSignature(String),

    #[error("transaction {0} has an invalid signature")]
    InvalidSignature(String),

    #[error("transaction {0} outputs overflow")]
    AmountOverflow(String),

    #[error("insufficient funds (required {required}, available {available})")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("replayed nonce (expected {expected}, got {got})")]
    ReplayedNonce { expected: u64, got: u64 },

    #[error("nonce out of order (expected {expected}, got {got})")]
    OutOfOrderNonce { expected: u64, got: u64 },
}

/// Errors that invalidate a whole block.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("transaction {index} failed on replay: {reason}")]
    Replay { index: usize, reason: TxRejection },

    #[error("commitment error: {0}")]
    Commitment(#[from] MerkleError),

    #[error("block needs its predecessor")]
    MissingPredecessor,

    #[error("first block cannot have a predecessor")]
    UnexpectedPredecessor,

    #[error("predecessor mismatch (declared {declared:?}, actual {actual})")]
    PredecessorMismatch {
        declared: Option<Hash>,
        actual: Hash,
    },

    #[error("chain length mismatch (expected {expected}, got {got})")]
    ChainLengthMismatch { expected: u64, got: u64 },

    #[error("transaction {index} declared under a different id")]
    TransactionIdMismatch { index: usize },

    #[error("first block balances must be in strictly increasing address order (entry {index})")]
    UnorderedBalances { index: usize },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BlockError>;

/// Milliseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// A block and the ledger state after its transactions.
#[derive(Debug, Clone)]
pub struct Block {
    prev_block_hash: Option<Hash>,
    target: BigUint,
    ledger: LedgerState,
    /// Accepted transactions, in order.
    transactions: Vec<Transaction>,
    /// Ids of `transactions`, for duplicate checks.
    tx_ids: HashSet<String>,
    merkle_leaf_ids: Vec<String>,
    chain_length: u64,
    timestamp: u64,
    reward_addr: Option<Address>,
    coinbase_reward: u64,
    max_transactions: usize,
    proof: Option<u64>,
    root_hash: Option<Hash>,
    commitment: Option<MerkleTree>,
}

impl Block {
    /// Create a block stamped with the current time.
    pub fn new(reward_addr: Option<Address>, prev: Option<&Block>, config: &ChainConfig) -> Self {
        Self::new_at(reward_addr, prev, config, current_timestamp())
    }

    /// Create a block with an explicit timestamp.
    ///
    /// With a predecessor, the block starts from a copy of its ledger, pays
    /// the predecessor's miner, and retargets from the predecessor's target.
    /// Without one, it is the first block and uses the configured target.
    pub fn new_at(
        reward_addr: Option<Address>,
        prev: Option<&Block>,
        config: &ChainConfig,
        timestamp: u64,
    ) -> Self {
        let mut block = Self {
            prev_block_hash: None,
            target: config.pow.initial_target.clone(),
            ledger: LedgerState::new(),
            transactions: Vec::new(),
            tx_ids: HashSet::new(),
            merkle_leaf_ids: Vec::new(),
            chain_length: 0,
            timestamp,
            reward_addr,
            coinbase_reward: config.coinbase_reward,
            max_transactions: config.max_transactions_per_block,
            proof: None,
            root_hash: None,
            commitment: None,
        };

        if let Some(prev) = prev {
            block.prev_block_hash = Some(prev.hash());
            block.chain_length = prev.chain_length + 1;
            block.ledger = prev.successor_ledger();
            block.target = next_target(
                prev.timestamp,
                timestamp,
                &prev.target,
                config.pow.block_interval,
            );
        }

        block
    }

    /// Create the first block, declaring the initial balances.
    pub fn genesis<I>(balances: I, config: &ChainConfig) -> Self
    where
        I: IntoIterator<Item = (Address, u64)>,
    {
        Self::genesis_at(balances, config, current_timestamp())
    }

    pub fn genesis_at<I>(balances: I, config: &ChainConfig, timestamp: u64) -> Self
    where
        I: IntoIterator<Item = (Address, u64)>,
    {
        let mut block = Self::new_at(None, None, config, timestamp);
        block.ledger = LedgerState::from_balances(balances);
        block
    }

    /// The ledger a successor starts from: ours, plus our miner's reward.
    fn successor_ledger(&self) -> LedgerState {
        let mut ledger = self.ledger.clone();
        if let Some(reward_addr) = &self.reward_addr {
            ledger.credit(reward_addr, self.total_rewards());
        }
        ledger
    }

    pub fn is_genesis(&self) -> bool {
        self.chain_length == 0
    }

    // =========================================================================
    // Canonical form and proof of work
    // =========================================================================

    /// The hashed, wire-transferred representation.
    pub fn canonical(&self) -> CanonicalBlock {
        if self.is_genesis() {
            CanonicalBlock::Genesis(GenesisForm {
                chain_length: self.chain_length,
                timestamp: self.timestamp,
                balances: self
                    .ledger
                    .balances()
                    .map(|(address, amount)| (*address, *amount))
                    .collect(),
            })
        } else {
            CanonicalBlock::Successor(SuccessorForm {
                chain_length: self.chain_length,
                timestamp: self.timestamp,
                transactions: self
                    .transactions
                    .iter()
                    .map(|tx| (tx.id(), tx.clone()))
                    .collect(),
                prev_block_hash: self.prev_block_hash,
                proof: self.proof,
                reward_addr: self.reward_addr,
            })
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(self.canonical().to_json()?)
    }

    /// Digest of the canonical form; the block's identity.
    pub fn hash(&self) -> Hash {
        let encoded = self
            .canonical()
            .to_json()
            .expect("serialization should not fail");
        hash(&encoded)
    }

    /// Hex id referenced by successors.
    pub fn id(&self) -> String {
        self.hash().to_hex()
    }

    pub fn has_valid_proof(&self) -> bool {
        meets_target(&self.hash(), &self.target)
    }

    pub fn set_proof(&mut self, proof: u64) {
        Minable::set_proof(self, proof);
    }

    /// Search for a proof and keep it on success.
    ///
    /// The transaction set must be final before calling.
    pub fn mine(&mut self, miner: &Miner, cancel: &AtomicBool) -> Option<MiningOutcome> {
        let outcome = miner.mine(&*self, cancel)?;
        self.set_proof(outcome.proof);
        Some(outcome)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Validate and apply a transaction.
    ///
    /// Checks run in order (capacity, duplicate, signature present, signature
    /// valid, amounts, funds, nonce) and stop at the first failure.
    pub fn add_transaction(&mut self, tx: Transaction) -> std::result::Result<(), TxRejection> {
        let id = tx.id();
        match self.check_transaction(&tx, &id) {
            Ok(total) => {
                self.apply_transaction(tx, id, total);
                Ok(())
            }
            Err(reason) => {
                debug!(tx = %id, %reason, "transaction rejected");
                Err(reason)
            }
        }
    }

    /// Returns the amount to debit from the sender.
    fn check_transaction(
        &self,
        tx: &Transaction,
        id: &str,
    ) -> std::result::Result<u64, TxRejection> {
        if self.transactions.len() >= self.max_transactions {
            return Err(TxRejection::BlockFull {
                max: self.max_transactions,
            });
        }

        if self.tx_ids.contains(id) {
            return Err(TxRejection::Duplicate(id.to_string()));
        }

        if !tx.is_signed() {
            return Err(TxRejection::MissingSignature(id.to_string()));
        }

        if !tx.valid_signature() {
            return Err(TxRejection::InvalidSignature(id.to_string()));
        }

        let required = tx
            .total_output()
            .ok_or_else(|| TxRejection::AmountOverflow(id.to_string()))?;

        if !tx.sufficient_funds(self) {
            return Err(TxRejection::InsufficientFunds {
                required,
                available: self.balance_of(&tx.from),
            });
        }

        let expected = self.ledger.expected_nonce(&tx.from);
        match tx.nonce.cmp(&expected) {
            Ordering::Less => Err(TxRejection::ReplayedNonce {
                expected,
                got: tx.nonce,
            }),
            // Not queued: the sender must resubmit once the gap is filled.
            Ordering::Greater => Err(TxRejection::OutOfOrderNonce {
                expected,
                got: tx.nonce,
            }),
            Ordering::Equal => Ok(required),
        }
    }

    fn apply_transaction(&mut self, tx: Transaction, id: String, total: u64) {
        self.ledger.advance_nonce(&tx.from);
        let debited = self.ledger.debit(&tx.from, total);
        debug_assert!(debited, "funds were checked before applying");
        for output in &tx.outputs {
            self.ledger.credit(&output.address, output.amount);
        }

        self.tx_ids.insert(id.clone());
        self.merkle_leaf_ids.push(id);
        self.transactions.push(tx);

        // Any earlier commitment no longer covers the leaf list.
        self.root_hash = None;
        self.commitment = None;
    }

    /// Rebuild the ledger from `prev` and replay every held transaction.
    ///
    /// On error the block has been partly overwritten and must be discarded.
    pub fn rerun(&mut self, prev: &Block) -> Result<()> {
        self.ledger = prev.successor_ledger();
        self.tx_ids.clear();
        self.merkle_leaf_ids.clear();
        self.root_hash = None;
        self.commitment = None;

        let transactions = std::mem::take(&mut self.transactions);
        for (index, tx) in transactions.into_iter().enumerate() {
            if let Err(reason) = self.add_transaction(tx) {
                warn!(
                    chain_length = self.chain_length,
                    index,
                    %reason,
                    "block replay failed"
                );
                return Err(BlockError::Replay { index, reason });
            }
        }

        self.build_commitment()?;
        Ok(())
    }

    /// Build the Merkle commitment over the accepted transaction ids.
    pub fn build_commitment(&mut self) -> std::result::Result<Hash, MerkleError> {
        let tree = MerkleTree::new(&self.merkle_leaf_ids)?;
        let root = tree.root();
        self.commitment = Some(tree);
        self.root_hash = Some(root);
        Ok(root)
    }

    /// Inclusion proof for a held transaction, once the commitment is built.
    pub fn merkle_proof(&self, tx_id: &str) -> Option<MerkleProof> {
        let index = self.merkle_leaf_ids.iter().position(|id| id == tx_id)?;
        self.commitment.as_ref()?.path(index)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn balance_of(&self, address: &Address) -> u64 {
        self.ledger.balance_of(address)
    }

    pub fn expected_nonce(&self, address: &Address) -> u64 {
        self.ledger.expected_nonce(address)
    }

    /// Coinbase plus every fee in this block.
    pub fn total_rewards(&self) -> u64 {
        self.transactions
            .iter()
            .fold(self.coinbase_reward, |acc, tx| acc.saturating_add(tx.fee))
    }

    /// Whether this block (not its ancestors) holds `tx`.
    pub fn contains(&self, tx: &Transaction) -> bool {
        self.tx_ids.contains(&tx.id())
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn merkle_leaf_ids(&self) -> &[String] {
        &self.merkle_leaf_ids
    }

    pub fn ledger(&self) -> &LedgerState {
        &self.ledger
    }

    pub fn prev_block_hash(&self) -> Option<Hash> {
        self.prev_block_hash
    }

    pub fn target(&self) -> &BigUint {
        &self.target
    }

    pub fn chain_length(&self) -> u64 {
        self.chain_length
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn reward_addr(&self) -> Option<Address> {
        self.reward_addr
    }

    pub fn coinbase_reward(&self) -> u64 {
        self.coinbase_reward
    }

    pub fn proof(&self) -> Option<u64> {
        self.proof
    }

    pub fn root_hash(&self) -> Option<Hash> {
        self.root_hash
    }

    pub fn commitment(&self) -> Option<&MerkleTree> {
        self.commitment.as_ref()
    }

    // =========================================================================
    // Wire decoding
    // =========================================================================

    /// Rebuild a received block against its declared predecessor.
    ///
    /// Successor blocks are replayed with [`Block::rerun`]; any invalid
    /// transaction rejects the whole block.
    pub fn from_canonical(
        form: CanonicalBlock,
        prev: Option<&Block>,
        config: &ChainConfig,
    ) -> Result<Self> {
        match form {
            CanonicalBlock::Genesis(form) => {
                if prev.is_some() {
                    return Err(BlockError::UnexpectedPredecessor);
                }
                if form.chain_length != 0 {
                    return Err(BlockError::ChainLengthMismatch {
                        expected: 0,
                        got: form.chain_length,
                    });
                }
                // Re-sorting or merging entries would change the block's hash.
                if let Some(index) = form
                    .balances
                    .windows(2)
                    .position(|pair| pair[0].0 >= pair[1].0)
                {
                    return Err(BlockError::UnorderedBalances { index: index + 1 });
                }
                let mut block = Self::genesis_at(form.balances, config, form.timestamp);
                block.build_commitment()?;
                Ok(block)
            }
            CanonicalBlock::Successor(form) => {
                let prev = prev.ok_or(BlockError::MissingPredecessor)?;

                let actual = prev.hash();
                if form.prev_block_hash != Some(actual) {
                    return Err(BlockError::PredecessorMismatch {
                        declared: form.prev_block_hash,
                        actual,
                    });
                }

                let expected = prev.chain_length + 1;
                if form.chain_length != expected {
                    return Err(BlockError::ChainLengthMismatch {
                        expected,
                        got: form.chain_length,
                    });
                }

                let mut transactions = Vec::with_capacity(form.transactions.len());
                for (index, (id, tx)) in form.transactions.into_iter().enumerate() {
                    if tx.id() != id {
                        return Err(BlockError::TransactionIdMismatch { index });
                    }
                    transactions.push(tx);
                }

                let mut block = Self::new_at(form.reward_addr, Some(prev), config, form.timestamp);
                block.proof = form.proof;
                block.transactions = transactions;
                block.rerun(prev)?;
                Ok(block)
            }
        }
    }

    /// Decode canonical JSON and rebuild the block.
    pub fn from_json(bytes: &[u8], prev: Option<&Block>, config: &ChainConfig) -> Result<Self> {
        let form = CanonicalBlock::from_json(bytes)?;
        Self::from_canonical(form, prev, config)
    }
}

impl BalanceView for Block {
    fn balance_of(&self, address: &Address) -> u64 {
        self.ledger.balance_of(address)
    }
}

impl Minable for Block {
    fn set_proof(&mut self, proof: u64) {
        self.proof = Some(proof);
    }

    fn pow_hash(&self) -> Hash {
        self.hash()
    }

    fn target(&self) -> &BigUint {
        &self.target
    }
}
