use serde::{Deserialize, Serialize};

use crate::worker::{LedgerWorkerId, WorkerId};

/// Reward owed to one worker and its delegators for an epoch, in the ledger's
/// smallest unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardAssignment {
    pub worker_id: LedgerWorkerId,
    pub peer_id: WorkerId,
    pub worker_reward: u128,
    pub staker_reward: u128,
}

impl RewardAssignment {
    pub fn total(&self) -> u128 {
        self.worker_reward.saturating_add(self.staker_reward)
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

/// Network-wide inputs of the reward formula for one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Bond every worker locks to be eligible.
    pub bond_amount: u128,
    /// Wall-clock length of the epoch.
    pub epoch_seconds: u64,
    /// Yearly yield targeted for a fully performing worker, e.g. `0.2`.
    pub target_apr: f64,
}
