use distribution_models::{EpochRange, RewardAssignment};
use sp_core::H256;

use crate::models::batch::Batch;
use crate::utils::errors::{DistributionError, Result};
use crate::utils::merkle::MerkleTree;

/// Split sorted assignments into consecutive batches of at most
/// `batch_size` entries.
pub fn create_batches(assignments: &[RewardAssignment], batch_size: usize) -> Result<Vec<Batch>> {
    if assignments.is_empty() {
        return Err(DistributionError::EmptyTree);
    }
    if batch_size == 0 {
        return Err(DistributionError::InvalidInput("batch size must be positive".to_string()));
    }

    assignments
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| Batch::new(index, chunk.to_vec()))
        .collect()
}

/// Batches of one epoch together with the Merkle tree over their leaves.
#[derive(Debug, Clone)]
pub struct RewardTree {
    range: EpochRange,
    batches: Vec<Batch>,
    tree: MerkleTree,
}

impl RewardTree {
    pub fn build(range: EpochRange, assignments: &[RewardAssignment], batch_size: usize) -> Result<Self> {
        let batches = create_batches(assignments, batch_size)?;
        let leaves: Vec<H256> = batches.iter().map(|b| b.leaf_hash).collect();
        let tree = MerkleTree::build(&leaves)?;
        Ok(Self { range, batches, tree })
    }

    pub fn range(&self) -> EpochRange {
        self.range
    }

    pub fn root(&self) -> H256 {
        self.tree.root()
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn total_batches(&self) -> usize {
        self.batches.len()
    }

    pub fn total_workers(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    pub fn total_rewards(&self) -> u128 {
        self.batches.iter().map(Batch::total_rewards).sum()
    }

    pub fn proof(&self, index: usize) -> Option<Vec<H256>> {
        self.tree.proof(index)
    }

    /// Whether batch `index` verifies against the root.
    pub fn verify(&self, index: usize) -> bool {
        match (self.batches.get(index), self.tree.proof(index)) {
            (Some(batch), Some(proof)) => MerkleTree::verify(batch.leaf_hash, &proof, self.root()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distribution_models::{LedgerWorkerId, WorkerId};

    fn assignments(n: u64) -> Vec<RewardAssignment> {
        (1..=n)
            .map(|i| RewardAssignment {
                worker_id: LedgerWorkerId(i),
                peer_id: WorkerId::new(format!("peer-{i}")),
                worker_reward: i as u128 * 100,
                staker_reward: i as u128 * 10,
            })
            .collect()
    }

    fn range() -> EpochRange {
        EpochRange::new(1000, 2000).unwrap()
    }

    #[test]
    fn batches_preserve_order_and_size() {
        let batches = create_batches(&assignments(5), 2).unwrap();
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(batches[2].assignments[0].worker_id, LedgerWorkerId(5));
        assert_eq!(batches[1].index, 1);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(create_batches(&[], 10), Err(DistributionError::EmptyTree)));
        assert!(matches!(create_batches(&assignments(1), 0), Err(DistributionError::InvalidInput(_))));
    }

    #[test]
    fn every_batch_verifies_against_the_root() {
        let tree = RewardTree::build(range(), &assignments(7), 2).unwrap();
        assert_eq!(tree.total_batches(), 4);
        assert_eq!(tree.total_workers(), 7);
        assert!((0..tree.total_batches()).all(|i| tree.verify(i)));
        assert!(!tree.verify(4));
    }

    #[test]
    fn single_batch_root_is_its_leaf() {
        let tree = RewardTree::build(range(), &assignments(3), 50).unwrap();
        assert_eq!(tree.root(), tree.batches()[0].leaf_hash);
        assert_eq!(tree.proof(0), Some(vec![]));
    }
}
