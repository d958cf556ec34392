use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use distribution_models::{
    Address, Commitment, DistributionStatus, EpochRange, LedgerWorkerId, MetricsWindow, TxHash,
    WorkerId,
};
use sp_core::H256;

use crate::models::audit::AuditEntry;
use crate::utils::errors::{FetchError, GatewayError};

/// Read and write access to the settlement ledger.
///
/// Writes are submitted through a signing collaborator bound to one
/// distributor account.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Account this gateway signs with.
    fn signer(&self) -> Address;

    async fn current_block(&self) -> Result<u64>;
    async fn epoch_length(&self) -> Result<u64>;
    async fn bond_amount(&self) -> Result<u128>;
    async fn last_rewarded_block(&self) -> Result<u64>;
    async fn required_approvals(&self) -> Result<u32>;
    async fn active_worker_count(&self) -> Result<u64>;

    /// Whether `distributor` is inside its round-robin commit window.
    async fn can_commit(&self, distributor: Address) -> Result<bool>;
    async fn is_committed(&self, range: &EpochRange) -> Result<bool>;
    /// Commitment stored under the range's commitment key.
    async fn commitment(&self, range: &EpochRange) -> Result<Commitment>;
    /// Ranges with a commitment that still has unprocessed batches.
    async fn open_commitments(&self) -> Result<Vec<EpochRange>>;
    async fn processed(&self, commitment_key: H256, leaf_hash: H256) -> Result<bool>;

    async fn worker_id_of(&self, peer_id: &WorkerId) -> Result<Option<LedgerWorkerId>>;
    /// Batched stake lookup; each worker resolves independently.
    async fn stakes(&self, workers: &[LedgerWorkerId]) -> HashMap<LedgerWorkerId, std::result::Result<u128, FetchError>>;

    async fn commit_root(
        &self,
        range: &EpochRange,
        root: H256,
        total_batches: u32,
        metadata_link: &str,
    ) -> std::result::Result<TxHash, GatewayError>;

    async fn approve_root(&self, range: &EpochRange) -> std::result::Result<TxHash, GatewayError>;

    async fn distribute(
        &self,
        range: &EpochRange,
        recipients: &[LedgerWorkerId],
        worker_rewards: &[u128],
        staker_rewards: &[u128],
        proof: &[H256],
    ) -> std::result::Result<TxHash, GatewayError>;
}

/// Windowed worker activity from the analytics store.
#[async_trait]
pub trait WorkerMetricsView: Send + Sync {
    async fn activity(&self, range: &EpochRange) -> Result<MetricsWindow>;
}

/// Operator-visible distribution progress, keyed by range.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn get(&self, range: &EpochRange) -> Result<Option<DistributionStatus>>;
    async fn list(&self) -> Result<Vec<DistributionStatus>>;
    async fn upsert(&self, status: DistributionStatus) -> Result<()>;
    /// Drop completed or failed statuses untouched for longer than
    /// `retention`. Returns how many were removed.
    async fn evict_expired(&self, retention: Duration) -> Result<usize>;
}

/// Append-only record of settlement attempts.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<()>;
    async fn entries(&self, range: Option<EpochRange>) -> Result<Vec<AuditEntry>>;
}
