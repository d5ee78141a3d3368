//! Ledger state carried by every block: balances and next expected nonces.
//!
//! Every address implicitly exists with zero balance and nonce zero.
//! The state is a plain owned value; a successor block works on a clone,
//! never on its predecessor's maps.

use forgechain_core::Address;
use std::collections::BTreeMap;

/// Balances and replay-protection counters, ordered by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    balances: BTreeMap<Address, u64>,
    next_nonce: BTreeMap<Address, u64>,
}

impl LedgerState {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger with initial balances and all nonces at zero.
    pub fn from_balances<I>(balances: I) -> Self
    where
        I: IntoIterator<Item = (Address, u64)>,
    {
        Self {
            balances: balances.into_iter().collect(),
            next_nonce: BTreeMap::new(),
        }
    }

    pub fn balance_of(&self, address: &Address) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Next nonce `address` may use.
    pub fn expected_nonce(&self, address: &Address) -> u64 {
        self.next_nonce.get(address).copied().unwrap_or(0)
    }

    /// Add to a balance.
    pub fn credit(&mut self, address: &Address, amount: u64) {
        let balance = self.balances.entry(*address).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Subtract from a balance.
    /// Returns false, leaving the balance untouched, when it is too small.
    pub fn debit(&mut self, address: &Address, amount: u64) -> bool {
        let available = self.balance_of(address);
        if available < amount {
            return false;
        }
        self.balances.insert(*address, available - amount);
        true
    }

    /// Advance the nonce and return the old value.
    pub fn advance_nonce(&mut self, address: &Address) -> u64 {
        let nonce = self.next_nonce.entry(*address).or_insert(0);
        let old = *nonce;
        *nonce = nonce.saturating_add(1);
        old
    }

    /// Balances in address order.
    pub fn balances(&self) -> impl Iterator<Item = (&Address, &u64)> {
        self.balances.iter()
    }

    /// Nonces in address order.
    pub fn nonces(&self) -> impl Iterator<Item = (&Address, &u64)> {
        self.next_nonce.iter()
    }

    /// Sum of every balance.
    pub fn total_supply(&self) -> u64 {
        self.balances
            .values()
            .fold(0u64, |acc, balance| acc.saturating_add(*balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[test]
    fn test_unknown_address_defaults() {
        let ledger = LedgerState::new();
        assert_eq!(ledger.balance_of(&addr(1)), 0);
        assert_eq!(ledger.expected_nonce(&addr(1)), 0);
    }

    #[test]
    fn test_credit_and_debit() {
        let mut ledger = LedgerState::from_balances([(addr(1), 100)]);

        ledger.credit(&addr(1), 50);
        assert_eq!(ledger.balance_of(&addr(1)), 150);

        assert!(ledger.debit(&addr(1), 100));
        assert_eq!(ledger.balance_of(&addr(1)), 50);

        assert!(!ledger.debit(&addr(1), 100));
        assert_eq!(ledger.balance_of(&addr(1)), 50);
    }

    #[test]
    fn test_credit_saturates() {
        let mut ledger = LedgerState::from_balances([(addr(1), u64::MAX - 1)]);
        ledger.credit(&addr(1), 10);
        assert_eq!(ledger.balance_of(&addr(1)), u64::MAX);
    }

    #[test]
    fn test_nonce_advance() {
        let mut ledger = LedgerState::new();
        assert_eq!(ledger.advance_nonce(&addr(1)), 0);
        assert_eq!(ledger.advance_nonce(&addr(1)), 1);
        assert_eq!(ledger.expected_nonce(&addr(1)), 2);
        assert_eq!(ledger.expected_nonce(&addr(2)), 0);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = LedgerState::from_balances([(addr(1), 10)]);
        let mut copy = original.clone();
        copy.credit(&addr(1), 5);
        copy.advance_nonce(&addr(1));

        assert_eq!(original.balance_of(&addr(1)), 10);
        assert_eq!(original.expected_nonce(&addr(1)), 0);
    }

    #[test]
    fn test_balances_iterate_in_address_order() {
        let ledger = LedgerState::from_balances([(addr(3), 3), (addr(1), 1), (addr(2), 2)]);
        let order: Vec<u64> = ledger.balances().map(|(_, b)| *b).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(ledger.total_supply(), 6);
    }
}
