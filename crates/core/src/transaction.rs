//! Signed value transfers and the checks a block delegates to them.

use crate::crypto::{Address, Keypair, PublicKey, Signature};
use crate::hash::{hash, Hash};
use serde::{Deserialize, Serialize};

/// Read access to balances, as seen by the block a transaction is applied to.
pub trait BalanceView {
    /// Current balance of `address`, zero when unknown.
    fn balance_of(&self, address: &Address) -> u64;
}

/// A single payment inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub amount: u64,
    pub address: Address,
}

impl Output {
    pub fn new(amount: u64, address: Address) -> Self {
        Self { amount, address }
    }
}

/// A transaction on the blockchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Sender's address.
    pub from: Address,
    /// Sender's sequence number.
    pub nonce: u64,
    /// Key the sender's address is derived from.
    pub pub_key: PublicKey,
    /// Signature over the transaction id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<Signature>,
    /// Amount paid to the miner.
    pub fee: u64,
    /// Payments, in order.
    pub outputs: Vec<Output>,
    /// Opaque payload.
    #[serde(default, with = "crate::encoding", skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
}

/// Everything but the signature; this is what the id commits to.
#[derive(Serialize)]
struct UnsignedTransaction<'a> {
    from: &'a Address,
    nonce: u64,
    pub_key: [u8; 32],
    fee: u64,
    outputs: &'a [Output],
    data: &'a [u8],
}

impl Transaction {
    /// Create an unsigned transaction sent from the address of `pub_key`.
    pub fn new(pub_key: PublicKey, nonce: u64, outputs: Vec<Output>, fee: u64) -> Self {
        Self {
            from: pub_key.to_address(),
            nonce,
            pub_key,
            sig: None,
            fee,
            outputs,
            data: Vec::new(),
        }
    }

    /// Create a single-output payment.
    pub fn transfer(pub_key: PublicKey, to: Address, amount: u64, nonce: u64, fee: u64) -> Self {
        Self::new(pub_key, nonce, vec![Output::new(amount, to)], fee)
    }

    /// Attach an opaque payload.
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Digest of the unsigned content.
    pub fn signing_hash(&self) -> Hash {
        let unsigned = UnsignedTransaction {
            from: &self.from,
            nonce: self.nonce,
            pub_key: self.pub_key.as_bytes(),
            fee: self.fee,
            outputs: &self.outputs,
            data: &self.data,
        };
        let encoded = bincode::serialize(&unsigned).expect("serialization should not fail");
        hash(&encoded)
    }

    /// Transaction id: hex of the signing hash. Stable across signing.
    pub fn id(&self) -> String {
        self.signing_hash().to_hex()
    }

    pub fn sign(&mut self, keypair: &Keypair) {
        let hash = self.signing_hash();
        self.sig = Some(keypair.sign_hash(&hash));
    }

    pub fn signed(mut self, keypair: &Keypair) -> Self {
        self.sign(keypair);
        self
    }

    pub fn is_signed(&self) -> bool {
        self.sig.is_some()
    }

    /// True when the signature verifies and the key owns `from`.
    pub fn valid_signature(&self) -> bool {
        let Some(sig) = &self.sig else {
            return false;
        };
        if self.pub_key.to_address() != self.from {
            return false;
        }
        self.pub_key
            .verify(self.signing_hash().as_bytes(), sig)
            .is_ok()
    }

    /// Sum of all outputs plus the fee, `None` if it overflows `u64`.
    pub fn total_output(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(self.fee, |acc, out| acc.checked_add(out.amount))
    }

    /// Whether the sender can cover `total_output` in `view`.
    /// An overflowing total can never be covered.
    pub fn sufficient_funds(&self, view: &impl BalanceView) -> bool {
        self.total_output()
            .is_some_and(|total| total <= view.balance_of(&self.from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Balances(HashMap<Address, u64>);

    impl BalanceView for Balances {
        fn balance_of(&self, address: &Address) -> u64 {
            self.0.get(address).copied().unwrap_or(0)
        }
    }

    fn recipient() -> Address {
        Address::from_bytes([2u8; 20])
    }

    #[test]
    fn test_transfer_transaction() {
        let keypair = Keypair::generate();
        let tx = Transaction::transfer(keypair.public_key.clone(), recipient(), 1000, 0, 1);

        assert_eq!(tx.from, keypair.address());
        assert_eq!(tx.outputs, vec![Output::new(1000, recipient())]);
        assert!(!tx.is_signed());
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::generate();
        let tx = Transaction::transfer(keypair.public_key.clone(), recipient(), 1000, 0, 1)
            .signed(&keypair);

        assert!(tx.is_signed());
        assert!(tx.valid_signature());
    }

    #[test]
    fn test_unsigned_is_not_valid() {
        let keypair = Keypair::generate();
        let tx = Transaction::transfer(keypair.public_key.clone(), recipient(), 1000, 0, 1);
        assert!(!tx.valid_signature());
    }

    #[test]
    fn test_wrong_key_signature_invalid() {
        let owner = Keypair::generate();
        let thief = Keypair::generate();
        let tx = Transaction::transfer(owner.public_key.clone(), recipient(), 1000, 0, 1)
            .signed(&thief);
        assert!(!tx.valid_signature());
    }

    #[test]
    fn test_tampered_output_invalidates_signature() {
        let keypair = Keypair::generate();
        let mut tx = Transaction::transfer(keypair.public_key.clone(), recipient(), 1000, 0, 1)
            .signed(&keypair);
        tx.outputs[0].amount = 9999;
        assert!(!tx.valid_signature());
    }

    #[test]
    fn test_spoofed_sender_invalid() {
        let keypair = Keypair::generate();
        let mut tx = Transaction::transfer(keypair.public_key.clone(), recipient(), 1000, 0, 1);
        tx.from = Address::from_bytes([9u8; 20]);
        tx.sign(&keypair);
        assert!(!tx.valid_signature());
    }

    #[test]
    fn test_id_stable_across_signing() {
        let keypair = Keypair::generate();
        let tx = Transaction::transfer(keypair.public_key.clone(), recipient(), 1000, 0, 1);
        let id = tx.id();
        assert_eq!(tx.signed(&keypair).id(), id);
    }

    #[test]
    fn test_id_depends_on_nonce() {
        let keypair = Keypair::generate();
        let tx1 = Transaction::transfer(keypair.public_key.clone(), recipient(), 1000, 0, 1);
        let tx2 = Transaction::transfer(keypair.public_key.clone(), recipient(), 1000, 1, 1);
        assert_ne!(tx1.id(), tx2.id());
    }

    #[test]
    fn test_total_output_includes_fee() {
        let keypair = Keypair::generate();
        let tx = Transaction::new(
            keypair.public_key.clone(),
            0,
            vec![
                Output::new(10, recipient()),
                Output::new(20, Address::from_bytes([3u8; 20])),
            ],
            2,
        );
        assert_eq!(tx.total_output(), Some(32));
    }

    #[test]
    fn test_total_output_overflow() {
        let keypair = Keypair::generate();
        let tx = Transaction::transfer(keypair.public_key.clone(), recipient(), u64::MAX, 0, 1);
        assert_eq!(tx.total_output(), None);

        let tx = Transaction::new(
            keypair.public_key.clone(),
            0,
            vec![Output::new(u64::MAX, recipient()), Output::new(u64::MAX, Address::ZERO)],
            0,
        );
        assert_eq!(tx.total_output(), None);

        // Even an unbounded balance cannot cover it.
        let mut balances = HashMap::new();
        balances.insert(keypair.address(), u64::MAX);
        assert!(!tx.sufficient_funds(&Balances(balances)));
    }

    #[test]
    fn test_sufficient_funds() {
        let keypair = Keypair::generate();
        let tx = Transaction::transfer(keypair.public_key.clone(), recipient(), 40, 0, 2);

        let mut balances = HashMap::new();
        balances.insert(keypair.address(), 42);
        assert!(tx.sufficient_funds(&Balances(balances.clone())));

        balances.insert(keypair.address(), 41);
        assert!(!tx.sufficient_funds(&Balances(balances)));
    }

    #[test]
    fn test_json_roundtrip_keeps_signature_valid() {
        let keypair = Keypair::generate();
        let tx = Transaction::transfer(keypair.public_key.clone(), recipient(), 5, 3, 1)
            .with_data(vec![1, 2, 3])
            .signed(&keypair);

        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"pubKey\""));
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
        assert!(back.valid_signature());
    }
}
