//! Cancellable proof search.
//!
//! The miner never touches the caller's block: each worker mines a clone and
//! walks its own strided slice of the proof space, so workers never try the
//! same value. A shared flag stops every worker as soon as one succeeds or the
//! caller cancels (for example when a competing block arrives).

use crate::pow::{meets_target, Minable};
use forgechain_core::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// A satisfying proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningOutcome {
    /// The proof value.
    pub proof: u64,
    /// Digest of the block carrying that proof.
    pub hash: Hash,
    /// Proofs tried across all workers.
    pub attempts: u64,
}

/// Proof-search worker pool.
#[derive(Debug, Clone)]
pub struct Miner {
    workers: usize,
}

impl Default for Miner {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Miner {
    /// Create a miner with `workers` threads (at least one).
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Search the whole proof space until success or `cancel` is raised.
    ///
    /// Returns `None` when cancelled or when the space is exhausted.
    pub fn mine<B: Minable>(&self, block: &B, cancel: &AtomicBool) -> Option<MiningOutcome> {
        let start = Instant::now();
        let found = AtomicBool::new(false);
        let attempts = AtomicU64::new(0);
        let step = self.workers as u64;

        info!(workers = self.workers, target_bits = block.target().bits(), "mining started");

        let winner = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..step)
                .map(|offset| {
                    let found = &found;
                    let attempts = &attempts;
                    scope.spawn(move || {
                        let outcome = search(block, offset, step, u64::MAX, cancel, found);
                        attempts.fetch_add(outcome.1, Ordering::Relaxed);
                        outcome.0
                    })
                })
                .collect();

            handles
                .into_iter()
                .filter_map(|handle| handle.join().ok().flatten())
                .min_by_key(|(proof, _)| *proof)
        });

        let attempts = attempts.load(Ordering::Relaxed);
        match winner {
            Some((proof, hash)) => {
                info!(
                    proof,
                    attempts,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    hash = %hash,
                    "mining succeeded"
                );
                Some(MiningOutcome {
                    proof,
                    hash,
                    attempts,
                })
            }
            None => {
                info!(attempts, "mining stopped without a proof");
                None
            }
        }
    }

    /// Single-worker search over `start, start + step, ...` below `limit`.
    pub fn mine_range<B: Minable>(
        &self,
        block: &B,
        start: u64,
        step: u64,
        limit: u64,
        cancel: &AtomicBool,
    ) -> Option<MiningOutcome> {
        let found = AtomicBool::new(false);
        let (winner, attempts) = search(block, start, step.max(1), limit, cancel, &found);
        winner.map(|(proof, hash)| MiningOutcome {
            proof,
            hash,
            attempts,
        })
    }
}

/// Returns the winning `(proof, hash)` if this worker found one, plus its attempt count.
fn search<B: Minable>(
    block: &B,
    start: u64,
    step: u64,
    limit: u64,
    cancel: &AtomicBool,
    found: &AtomicBool,
) -> (Option<(u64, Hash)>, u64) {
    let mut candidate = block.clone();
    let mut attempts = 0u64;
    let mut proof = start;

    while proof < limit {
        if cancel.load(Ordering::Relaxed) || found.load(Ordering::Relaxed) {
            debug!(start, attempts, "worker stopped");
            return (None, attempts);
        }

        candidate.set_proof(proof);
        let hash = candidate.pow_hash();
        attempts += 1;

        if meets_target(&hash, candidate.target()) {
            found.store(true, Ordering::Relaxed);
            return (Some((proof, hash)), attempts);
        }

        proof = match proof.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }

    (None, attempts)
}
