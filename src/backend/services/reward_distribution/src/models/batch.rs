use distribution_models::{LedgerWorkerId, RewardAssignment};
use serde::{Deserialize, Serialize};
use sp_core::H256;

use crate::utils::crypto::CryptoUtils;
use crate::utils::errors::Result;

/// Consecutive group of assignments settled by one `distribute` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub assignments: Vec<RewardAssignment>,
    pub leaf_hash: H256,
}

impl Batch {
    pub fn new(index: usize, assignments: Vec<RewardAssignment>) -> Result<Self> {
        let recipients: Vec<_> = assignments.iter().map(|a| a.worker_id).collect();
        let worker_rewards: Vec<_> = assignments.iter().map(|a| a.worker_reward).collect();
        let staker_rewards: Vec<_> = assignments.iter().map(|a| a.staker_reward).collect();
        let leaf_hash = CryptoUtils::leaf_hash(&recipients, &worker_rewards, &staker_rewards)?;

        Ok(Self {
            index,
            assignments,
            leaf_hash,
        })
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn recipients(&self) -> Vec<LedgerWorkerId> {
        self.assignments.iter().map(|a| a.worker_id).collect()
    }

    pub fn worker_rewards(&self) -> Vec<u128> {
        self.assignments.iter().map(|a| a.worker_reward).collect()
    }

    pub fn staker_rewards(&self) -> Vec<u128> {
        self.assignments.iter().map(|a| a.staker_reward).collect()
    }

    pub fn total_rewards(&self) -> u128 {
        self.assignments.iter().map(RewardAssignment::total).sum()
    }

    /// Canonical encoding the leaf hash is computed over.
    pub fn encode(&self) -> Result<Vec<u8>> {
        CryptoUtils::encode_batch(&self.recipients(), &self.worker_rewards(), &self.staker_rewards())
    }
}
