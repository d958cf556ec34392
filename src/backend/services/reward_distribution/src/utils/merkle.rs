//! Binary Merkle tree over batch leaves.
//!
//! Parents hash their two children sorted by byte value, and an odd node at
//! the end of a level is paired with itself. Proofs carry sibling hashes only.

use sp_core::H256;

use crate::utils::crypto::CryptoUtils;
use crate::utils::errors::{DistributionError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// `levels[0]` holds the leaves, the last level holds the root.
    levels: Vec<Vec<H256>>,
}

impl MerkleTree {
    pub fn build(leaves: &[H256]) -> Result<Self> {
        if leaves.is_empty() {
            return Err(DistributionError::EmptyTree);
        }

        let mut levels = vec![leaves.to_vec()];
        while levels[levels.len() - 1].len() > 1 {
            let current = &levels[levels.len() - 1];
            let next = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => CryptoUtils::hash_pair(left, right),
                    [single] => CryptoUtils::hash_pair(single, single),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        Ok(Self { levels })
    }

    pub fn root(&self) -> H256 {
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaves(&self) -> &[H256] {
        &self.levels[0]
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Sibling hashes from the leaf at `index` up to the root.
    pub fn proof(&self, index: usize) -> Option<Vec<H256>> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut proof = Vec::with_capacity(self.levels.len() - 1);
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = position ^ 1;
            // an unpaired last node is its own sibling
            proof.push(*level.get(sibling).unwrap_or(&level[position]));
            position /= 2;
        }
        Some(proof)
    }

    pub fn proofs(&self) -> Vec<Vec<H256>> {
        (0..self.leaf_count())
            .filter_map(|index| self.proof(index))
            .collect()
    }

    pub fn verify(leaf: H256, proof: &[H256], root: H256) -> bool {
        CryptoUtils::verify_merkle_proof(root, proof, leaf)
    }
}
