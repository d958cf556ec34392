use distribution_models::{EpochRange, LedgerWorkerId, WorkerMetrics};
use serde::{Deserialize, Serialize};
use sp_core::H256;

/// Offline reward computation request.
#[derive(Debug, Clone, Deserialize)]
pub struct ComputeInput {
    pub range: EpochRange,
    pub bond_amount: u128,
    pub epoch_seconds: u64,
    /// Overrides the configured target APR.
    #[serde(default)]
    pub target_apr: Option<f64>,
    pub workers: Vec<WorkerMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    pub index: usize,
    pub leaf_hash: H256,
    pub proof: Vec<H256>,
    pub recipients: Vec<LedgerWorkerId>,
    pub worker_rewards: Vec<u128>,
    pub staker_rewards: Vec<u128>,
}

/// Root, totals and every batch with its proof.
#[derive(Debug, Clone, Serialize)]
pub struct ComputeOutput {
    pub range: EpochRange,
    pub root: H256,
    pub total_batches: usize,
    pub total_workers: usize,
    pub total_rewards: u128,
    pub cap: u128,
    pub batches: Vec<BatchOutput>,
}
