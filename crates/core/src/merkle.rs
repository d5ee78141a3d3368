//! Merkle commitment over a block's ordered transaction ids.
//!
//! Leaves are `hash(id)`. Each level above hashes adjacent pairs; an unpaired
//! last node is paired with itself. An empty id list commits to `hash(b"")`.

use crate::hash::{hash, hash_concat, Hash};
use std::fmt;
use thiserror::Error;

/// Errors raised while building a commitment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MerkleError {
    #[error("leaf {0} is an empty transaction id")]
    EmptyLeaf(usize),
}

/// Which side of the running hash a sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Inclusion proof for a single leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// Leaf hash being proven.
    pub leaf: Hash,
    /// Siblings from the leaf level up, with their side.
    pub siblings: Vec<(Hash, Side)>,
}

/// A binary hash tree, stored level by level (leaves first).
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash>>,
    leaf_count: usize,
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    hash_concat(&[left.as_ref(), right.as_ref()])
}

impl MerkleTree {
    /// Build the tree over transaction ids, in order.
    pub fn new(ids: &[String]) -> Result<Self, MerkleError> {
        if let Some(index) = ids.iter().position(|id| id.is_empty()) {
            return Err(MerkleError::EmptyLeaf(index));
        }
        let leaves: Vec<Hash> = ids.iter().map(|id| hash(id.as_bytes())).collect();
        Ok(Self::from_leaves(leaves))
    }

    /// Build the tree over already-hashed leaves.
    pub fn from_leaves(leaves: Vec<Hash>) -> Self {
        if leaves.is_empty() {
            return Self {
                levels: vec![vec![hash(b"")]],
                leaf_count: 0,
            };
        }

        let leaf_count = leaves.len();
        let mut levels = vec![leaves];

        loop {
            let current = &levels[levels.len() - 1];
            if current.len() == 1 {
                break;
            }
            let next: Vec<Hash> = current
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&pair[0])))
                .collect();
            levels.push(next);
        }

        Self { levels, leaf_count }
    }

    /// The single top-level node.
    pub fn root(&self) -> Hash {
        self.levels[self.levels.len() - 1][0]
    }

    /// Number of leaves, zero for the empty tree.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Sibling path for the leaf at `index`, `None` when out of range.
    pub fn path(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count {
            return None;
        }

        let leaf = self.levels[0][index];
        let mut siblings = Vec::with_capacity(self.levels.len() - 1);
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let entry = if idx % 2 == 0 {
                // An unpaired last node was hashed with itself.
                let sibling = level.get(idx + 1).copied().unwrap_or(level[idx]);
                (sibling, Side::Right)
            } else {
                (level[idx - 1], Side::Left)
            };
            siblings.push(entry);
            idx /= 2;
        }

        Some(MerkleProof { leaf, siblings })
    }

    /// Recompute the root from `leaf` along the path of `index` and compare.
    pub fn verify(&self, index: usize, leaf: &Hash, root: &Hash) -> bool {
        match self.path(index) {
            Some(proof) => fold_path(*leaf, &proof.siblings) == *root,
            None => false,
        }
    }
}

fn fold_path(leaf: Hash, siblings: &[(Hash, Side)]) -> Hash {
    siblings
        .iter()
        .fold(leaf, |current, (sibling, side)| match side {
            Side::Right => hash_pair(&current, sibling),
            Side::Left => hash_pair(sibling, &current),
        })
}

/// Verify a standalone proof against `root`.
pub fn verify_proof(root: &Hash, proof: &MerkleProof) -> bool {
    fold_path(proof.leaf, &proof.siblings) == *root
}

impl fmt::Display for MerkleTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, level) in self.levels.iter().rev().enumerate() {
            for node in level {
                writeln!(f, "{:indent$}{}", "", &node.to_hex()[..16], indent = depth * 2)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("tx-{i}")).collect()
    }

    #[test]
    fn test_empty_tree_has_sentinel_root() {
        let tree = MerkleTree::new(&[]).unwrap();
        assert_eq!(tree.root(), hash(b""));
        assert_eq!(tree.leaf_count(), 0);
        assert!(tree.path(0).is_none());
    }

    #[test]
    fn test_single_leaf_root_is_leaf_hash() {
        let ids = make_ids(1);
        let tree = MerkleTree::new(&ids).unwrap();
        assert_eq!(tree.root(), hash(ids[0].as_bytes()));
    }

    #[test]
    fn test_two_leaves() {
        let ids = make_ids(2);
        let tree = MerkleTree::new(&ids).unwrap();
        let expected = hash_pair(&hash(ids[0].as_bytes()), &hash(ids[1].as_bytes()));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_odd_leaf_is_self_paired() {
        let ids = make_ids(3);
        let tree = MerkleTree::new(&ids).unwrap();
        let h: Vec<Hash> = ids.iter().map(|id| hash(id.as_bytes())).collect();
        let expected = hash_pair(&hash_pair(&h[0], &h[1]), &hash_pair(&h[2], &h[2]));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_order_matters() {
        let ids = make_ids(4);
        let mut reversed = ids.clone();
        reversed.reverse();
        assert_ne!(
            MerkleTree::new(&ids).unwrap().root(),
            MerkleTree::new(&reversed).unwrap().root()
        );
    }

    #[test]
    fn test_empty_id_rejected() {
        let ids = vec!["a".to_string(), String::new()];
        assert_eq!(MerkleTree::new(&ids).unwrap_err(), MerkleError::EmptyLeaf(1));
    }

    #[test]
    fn test_verify_every_leaf() {
        for n in 1..=9 {
            let ids = make_ids(n);
            let tree = MerkleTree::new(&ids).unwrap();
            let root = tree.root();
            for (i, id) in ids.iter().enumerate() {
                assert!(tree.verify(i, &hash(id.as_bytes()), &root), "n={n} i={i}");
                assert!(verify_proof(&root, &tree.path(i).unwrap()));
            }
        }
    }

    #[test]
    fn test_path_sides() {
        let tree = MerkleTree::new(&make_ids(4)).unwrap();
        let proof = tree.path(2).unwrap();
        assert_eq!(proof.siblings.len(), 2);
        assert_eq!(proof.siblings[0].1, Side::Right);
        assert_eq!(proof.siblings[1].1, Side::Left);
    }

    #[test]
    fn test_tampered_sibling_fails() {
        let tree = MerkleTree::new(&make_ids(5)).unwrap();
        let root = tree.root();

        for i in 0..5 {
            let proof = tree.path(i).unwrap();
            for level in 0..proof.siblings.len() {
                let mut bad = proof.clone();
                bad.siblings[level].0 .0[0] ^= 0x01;
                assert!(!verify_proof(&root, &bad));
            }
        }
    }

    #[test]
    fn test_wrong_leaf_or_root_fails() {
        let ids = make_ids(4);
        let tree = MerkleTree::new(&ids).unwrap();
        let root = tree.root();
        assert!(!tree.verify(0, &hash(b"not a leaf"), &root));
        assert!(!tree.verify(0, &hash(ids[0].as_bytes()), &hash(b"wrong")));
        assert!(!tree.verify(10, &hash(ids[0].as_bytes()), &root));
    }

    #[test]
    fn test_display_dumps_every_level() {
        let tree = MerkleTree::new(&make_ids(3)).unwrap();
        let dump = tree.to_string();
        // 1 root + 2 internal + 3 leaves
        assert_eq!(dump.lines().count(), 6);
        assert!(dump.starts_with(&tree.root().to_hex()[..16]));
    }
}
