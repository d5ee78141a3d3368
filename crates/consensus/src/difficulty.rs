//! Per-block target retargeting.
//!
//! Every block compares its own timestamp with its predecessor's:
//! faster than the desired interval halves the target, slower scales it by
//! 3/2, exactly on time keeps it. All arithmetic is on `BigUint` so every
//! node computes the same value.

use num_bigint::BigUint;
use std::cmp::Ordering;
use tracing::debug;

/// Compute the next target from two consecutive timestamps.
///
/// A clock that runs backwards counts as zero elapsed time.
pub fn next_target(
    prev_timestamp: u64,
    current_timestamp: u64,
    prev_target: &BigUint,
    block_interval: u64,
) -> BigUint {
    let elapsed = current_timestamp.saturating_sub(prev_timestamp);

    let next = match elapsed.cmp(&block_interval) {
        Ordering::Less => prev_target >> 1u32,
        Ordering::Greater => (prev_target * 3u32) / 2u32,
        Ordering::Equal => prev_target.clone(),
    };

    debug!(
        elapsed,
        block_interval,
        prev_bits = prev_target.bits(),
        next_bits = next.bits(),
        "retargeted"
    );

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::{default_target, DEFAULT_BLOCK_INTERVAL};

    const D: u64 = DEFAULT_BLOCK_INTERVAL;

    #[test]
    fn test_fast_block_halves_target() {
        let t = default_target();
        assert_eq!(next_target(0, 5_000, &t, D), &t / 2u32);
    }

    #[test]
    fn test_slow_block_scales_by_three_halves() {
        let t = default_target();
        assert_eq!(next_target(0, 15_000, &t, D), (&t * 3u32) / 2u32);
    }

    #[test]
    fn test_on_time_block_keeps_target() {
        let t = default_target();
        assert_eq!(next_target(1_000, 11_000, &t, D), t);
    }

    #[test]
    fn test_odd_target_rounds_down() {
        let t = BigUint::from(7u32);
        assert_eq!(next_target(0, 1, &t, D), BigUint::from(3u32));
        assert_eq!(next_target(0, D + 1, &t, D), BigUint::from(10u32));
    }

    #[test]
    fn test_backwards_clock_counts_as_fast() {
        let t = BigUint::from(100u32);
        assert_eq!(next_target(20_000, 10_000, &t, D), BigUint::from(50u32));
    }

    #[test]
    fn test_exact_on_huge_targets() {
        // Beyond f64 precision: the scaled value must still be exact.
        let t = (BigUint::from(1u32) << 300u32) + BigUint::from(1u32);
        let next = next_target(0, D * 2, &t, D);
        assert_eq!(next, (BigUint::from(3u32) << 299u32) + BigUint::from(1u32));
    }
}
