//! Three-phase settlement: commit a reward root, collect approvals from other
//! distributors, then distribute each batch with its Merkle proof.
//!
//! Each phase re-reads ledger state before writing, so any distributor can
//! resume a range another one left half-done.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use distribution_models::{
    Address, Commitment, DistributionState, DistributionStatus, EpochRange, NetworkParams,
};
use futures::future::join_all;
use sp_core::H256;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{BatchConfig, CoordinatorConfig, DistributorConfig, RewardConfig};
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::batch::Batch;
use crate::models::report::{BatchOutcome, BatchResult, DistributionReport, PhaseOutcome};
use crate::repositories::traits::{AuditLog, ChainGateway, StatusStore, WorkerMetricsView};
use crate::services::batch_service::RewardTree;
use crate::services::metrics_service::MetricsService;
use crate::services::reward_service::RewardEngine;
use crate::utils::errors::{upstream, DistributionError, GatewayError, Result};
use crate::utils::merkle::MerkleTree;
use crate::utils::retry::{retry, RetryPolicy};

/// Range following `last_rewarded_block`, if it has ended and collected
/// `confirmations` further blocks by `current_block`.
pub fn next_range(
    last_rewarded_block: u64,
    epoch_length: u64,
    current_block: u64,
    confirmations: u64,
) -> Option<EpochRange> {
    let to_block = last_rewarded_block.checked_add(epoch_length)?;
    let range = EpochRange::new(last_rewarded_block, to_block).ok()?;
    is_final(range, current_block, confirmations).then_some(range)
}

/// Shift `range` forward by its own length `steps` times.
pub fn advance_range(range: EpochRange, steps: u32) -> EpochRange {
    (0..steps).fold(range, |r, _| r.following())
}

pub fn is_final(range: EpochRange, current_block: u64, confirmations: u64) -> bool {
    range.to_block.saturating_add(confirmations) <= current_block
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a range as being worked on for as long as it lives.
struct InFlight<'a> {
    ranges: &'a Mutex<HashSet<EpochRange>>,
    range: EpochRange,
}

impl<'a> InFlight<'a> {
    fn acquire(ranges: &'a Mutex<HashSet<EpochRange>>, range: EpochRange) -> Option<Self> {
        lock(ranges).insert(range).then_some(Self { ranges, range })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.ranges).remove(&self.range);
    }
}

pub struct CoordinatorHandles {
    pub commit: JoinHandle<()>,
    pub approve: JoinHandle<()>,
}

impl CoordinatorHandles {
    pub fn abort(&self) {
        self.commit.abort();
        self.approve.abort();
    }
}

pub struct DistributionCoordinator<G, M> {
    gateway: Arc<G>,
    metrics: Arc<M>,
    status: Arc<dyn StatusStore>,
    audit: Arc<dyn AuditLog>,
    engine: RewardEngine,
    metrics_service: MetricsService,
    rewards: RewardConfig,
    batching: BatchConfig,
    config: CoordinatorConfig,
    trees: RwLock<HashMap<EpochRange, Arc<RewardTree>>>,
    in_flight: Mutex<HashSet<EpochRange>>,
    approved: Mutex<HashSet<EpochRange>>,
}

impl<G, M> DistributionCoordinator<G, M>
where
    G: ChainGateway,
    M: WorkerMetricsView,
{
    pub fn new(
        gateway: Arc<G>,
        metrics: Arc<M>,
        status: Arc<dyn StatusStore>,
        audit: Arc<dyn AuditLog>,
        config: &DistributorConfig,
    ) -> Self {
        if config.coordinator.distributor != gateway.signer() {
            warn!(
                configured = ?config.coordinator.distributor,
                signer = ?gateway.signer(),
                "configured distributor differs from the gateway signer; using the signer"
            );
        }

        Self {
            gateway,
            metrics,
            status,
            audit,
            engine: RewardEngine::new(config.rewards.clone()),
            metrics_service: MetricsService::new(config.rewards.clone()),
            rewards: config.rewards.clone(),
            batching: config.batching.clone(),
            config: config.coordinator.clone(),
            trees: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            approved: Mutex::new(HashSet::new()),
        }
    }

    pub fn distributor(&self) -> Address {
        self.gateway.signer()
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Commit phase for the next unsettled range, if this distributor holds
    /// the commit slot and the range has ended.
    pub async fn commit_cycle(&self) -> Result<PhaseOutcome> {
        let me = self.distributor();
        if !self.gateway.can_commit(me).await.map_err(upstream)? {
            return Ok(PhaseOutcome::NotEligible {
                reason: "outside round-robin commit window".to_string(),
            });
        }

        let last = self.gateway.last_rewarded_block().await.map_err(upstream)?;
        let epoch_length = self.gateway.epoch_length().await.map_err(upstream)?;
        let current = self.gateway.current_block().await.map_err(upstream)?;

        match next_range(last, epoch_length, current, self.config.confirmations) {
            Some(range) => self.commit_range(range).await,
            None => Ok(PhaseOutcome::NotEligible {
                reason: format!("epoch after block {last} not final at block {current}"),
            }),
        }
    }

    /// Commit `range`, moving on to the following range whenever another
    /// distributor got there first.
    pub async fn commit_range(&self, range: EpochRange) -> Result<PhaseOutcome> {
        let policy = RetryPolicy::immediate(self.config.max_commit_retries.saturating_add(1));
        let this = self;

        let result = retry(
            &policy,
            |e: &DistributionError| matches!(e, DistributionError::Collision(_)),
            move |attempt| {
                let candidate = advance_range(range, attempt);
                async move {
                    if attempt > 0 {
                        warn!(%range, %candidate, attempt, "commit collided, trying the following range");
                    }
                    this.commit_attempt(candidate).await
                }
            },
        )
        .await;

        match result {
            Err(DistributionError::Collision(reason)) => {
                let last = advance_range(range, policy.max_attempts.saturating_sub(1));
                let err = DistributionError::RetriesExhausted {
                    attempts: policy.max_attempts,
                    last_error: reason,
                };
                error!(%range, error = %err, "could not find an uncontested range to commit");
                self.fail(last, &err).await;
                Err(err)
            }
            other => other,
        }
    }

    /// Operator request to settle a specific range now.
    pub async fn trigger(&self, range: EpochRange) -> Result<PhaseOutcome> {
        info!(%range, "distribution triggered by operator");
        if self.gateway.is_committed(&range).await.map_err(upstream)? {
            return self.approve_range(range).await;
        }
        if !self.gateway.can_commit(self.distributor()).await.map_err(upstream)? {
            return Ok(PhaseOutcome::NotEligible {
                reason: "outside round-robin commit window".to_string(),
            });
        }
        self.commit_attempt(range).await
    }

    #[instrument(name = "commit", skip_all, fields(range = %range))]
    async fn commit_attempt(&self, range: EpochRange) -> Result<PhaseOutcome> {
        let current = self.gateway.current_block().await.map_err(upstream)?;
        if !is_final(range, current, self.config.confirmations) {
            return Ok(PhaseOutcome::NotEligible {
                reason: format!("range {range} not final at block {current}"),
            });
        }

        let Some(_guard) = InFlight::acquire(&self.in_flight, range) else {
            return Ok(PhaseOutcome::NotEligible {
                reason: format!("range {range} already in progress"),
            });
        };

        let commitment = self.gateway.commitment(&range).await.map_err(upstream)?;
        if commitment.exists {
            debug!("range already committed");
            return Ok(PhaseOutcome::AlreadySettled { range });
        }

        self.begin(range).await;
        let tree = match self.prepare_tree(range).await {
            Ok(tree) => Some(tree),
            Err(DistributionError::InsufficientData(_)) => {
                info!("no rewardable workers, closing the range without batches");
                None
            }
            Err(e) => {
                self.fail(range, &e).await;
                return Err(e);
            }
        };

        self.enter(range, DistributionState::Committing).await;
        let me = self.distributor();
        let (root, total_batches) = tree
            .as_ref()
            .map_or((H256::zero(), 0), |t| (t.root(), t.total_batches() as u32));
        let link = self.metadata_link(&range);

        let gateway = self.gateway.as_ref();
        let (range_ref, link_ref) = (&range, link.as_str());
        let submitted = self
            .submit(move |_| gateway.commit_root(range_ref, root, total_batches, link_ref))
            .await;

        let tx_hash = match submitted.map_err(DistributionError::from) {
            Ok(tx_hash) => tx_hash,
            Err(DistributionError::AlreadySettled) => {
                debug!("commitment landed before our write");
                self.record(AuditEntry::skipped(range, AuditAction::Commit, me, "already committed"))
                    .await;
                self.abandon(range, "committed by another distributor").await;
                return Ok(PhaseOutcome::AlreadySettled { range });
            }
            Err(DistributionError::NotEligible(reason)) => {
                debug!(%reason, "commit refused for now");
                self.abandon(range, format!("commit refused: {reason}")).await;
                return Ok(PhaseOutcome::NotEligible { reason });
            }
            Err(err @ DistributionError::Collision(_)) => {
                self.record(AuditEntry::failed(range, AuditAction::Commit, me, err.to_string()))
                    .await;
                self.trees.write().await.remove(&range);
                self.abandon(range, err.to_string()).await;
                return Err(err);
            }
            Err(err) => {
                warn!(error = %err, "commit failed");
                self.record(AuditEntry::failed(range, AuditAction::Commit, me, err.to_string()))
                    .await;
                self.fail(range, &err).await;
                return Err(err);
            }
        };

        info!(root = ?root, total_batches, tx_hash = ?tx_hash, "committed reward root");
        self.record(AuditEntry::succeeded(range, AuditAction::Commit, me, Some(tx_hash)))
            .await;

        let Some(tree) = tree else {
            self.enter(range, DistributionState::Completed).await;
            return Ok(PhaseOutcome::NoRewards { range });
        };

        let commitment = self.gateway.commitment(&range).await.map_err(upstream)?;
        let required = self.gateway.required_approvals().await.map_err(upstream)?;
        if commitment.approval_count >= required {
            let report = self.distribute_locked(range, &tree).await;
            debug!(settled = report.settled(), failed = report.failed(), "distributed right after commit");
        }

        Ok(PhaseOutcome::Committed {
            range,
            root,
            total_batches,
            tx_hash,
        })
    }

    /// Approve and distribute every open commitment.
    pub async fn approve_cycle(&self) -> Result<Vec<(EpochRange, Result<PhaseOutcome>)>> {
        match self.status.evict_expired(self.config.status_retention()).await {
            Ok(0) => {}
            Ok(evicted) => debug!(evicted, "evicted expired distribution statuses"),
            Err(e) => warn!(error = %e, "failed to evict expired statuses"),
        }

        let ranges = self.gateway.open_commitments().await.map_err(upstream)?;
        self.prune_caches(&ranges).await;
        let this = self;
        let results = join_all(
            ranges
                .into_iter()
                .map(move |range| async move { (range, this.approve_range(range).await) }),
        )
        .await;

        for (range, result) in &results {
            match result {
                Ok(outcome) => debug!(%range, ?outcome, "approve pass finished"),
                Err(e) if e.is_correctness_defect() => error!(%range, error = %e, "refusing to settle range"),
                Err(e) if e.is_transient() => warn!(%range, error = %e, "approve pass deferred"),
                Err(e) => warn!(%range, error = %e, "approve pass failed"),
            }
        }

        Ok(results)
    }

    /// Approve a commitment made by another distributor once its root
    /// checks out, then distribute when enough approvals are in.
    #[instrument(name = "approve", skip_all, fields(range = %range))]
    pub async fn approve_range(&self, range: EpochRange) -> Result<PhaseOutcome> {
        let Some(_guard) = InFlight::acquire(&self.in_flight, range) else {
            return Ok(PhaseOutcome::NotEligible {
                reason: format!("range {range} already in progress"),
            });
        };

        let commitment = self.gateway.commitment(&range).await.map_err(upstream)?;
        if !commitment.exists {
            return Ok(PhaseOutcome::NotEligible {
                reason: format!("no commitment for {range}"),
            });
        }
        if commitment.is_fully_processed() {
            return Ok(PhaseOutcome::AlreadySettled { range });
        }

        let required = self.gateway.required_approvals().await.map_err(upstream)?;
        let me = self.distributor();

        if commitment.approval_count < required {
            let authored = commitment.committer == Some(me);
            if authored || lock(&self.approved).contains(&range) {
                return Ok(PhaseOutcome::NotEligible {
                    reason: format!("awaiting approvals ({}/{})", commitment.approval_count, required),
                });
            }

            let tree = self.verified_tree(&commitment).await?;
            self.enter(range, DistributionState::Committing).await;

            let gateway = self.gateway.as_ref();
            let range_ref = &range;
            match self.submit(move |_| gateway.approve_root(range_ref)).await.map_err(DistributionError::from) {
                Ok(tx_hash) => {
                    info!(tx_hash = ?tx_hash, "approved reward root");
                    self.record(AuditEntry::succeeded(range, AuditAction::Approve, me, Some(tx_hash)))
                        .await;
                }
                Err(DistributionError::AlreadySettled) => {
                    debug!("approval already recorded");
                    self.record(AuditEntry::skipped(range, AuditAction::Approve, me, "already approved"))
                        .await;
                }
                Err(DistributionError::NotEligible(reason)) => {
                    return Ok(PhaseOutcome::NotEligible { reason });
                }
                Err(err) => {
                    warn!(error = %err, "approve failed");
                    self.record(AuditEntry::failed(range, AuditAction::Approve, me, err.to_string()))
                        .await;
                    self.fail(range, &err).await;
                    return Err(err);
                }
            }
            lock(&self.approved).insert(range);

            let refreshed = self.gateway.commitment(&range).await.map_err(upstream)?;
            if refreshed.approval_count < required {
                return Ok(PhaseOutcome::Approved { range });
            }
            return Ok(PhaseOutcome::Distributed(self.distribute_locked(range, &tree).await));
        }

        let tree = self.verified_tree(&commitment).await?;
        Ok(PhaseOutcome::Distributed(self.distribute_locked(range, &tree).await))
    }

    /// Distribute every batch of `tree`, skipping batches already processed
    /// and continuing past failed ones. Caller holds the in-flight guard.
    async fn distribute_locked(&self, range: EpochRange, tree: &RewardTree) -> DistributionReport {
        self.enter(range, DistributionState::Distributing).await;

        let mut outcomes = Vec::with_capacity(tree.total_batches());
        for batch in tree.batches() {
            let result = self.settle_batch(range, tree, batch).await;
            outcomes.push(BatchOutcome {
                index: batch.index,
                leaf_hash: batch.leaf_hash,
                recipients: batch.len(),
                result,
            });

            let done = outcomes.iter().filter(|o| o.is_success()).count();
            self.update_status(range, move |s| s.processed_batches = done).await;
        }

        let report = DistributionReport {
            range,
            batches: outcomes,
        };

        match report.failure_summary() {
            Some(summary) => {
                warn!(failed = report.failed(), settled = report.settled(), "distribution finished with failed batches");
                self.update_status(range, move |s| {
                    s.fail(summary);
                })
                .await;
            }
            None => {
                info!(settled = report.settled(), skipped = report.skipped(), "distribution completed");
                self.enter(range, DistributionState::Completed).await;
                self.trees.write().await.remove(&range);
            }
        }

        report
    }

    async fn settle_batch(&self, range: EpochRange, tree: &RewardTree, batch: &Batch) -> BatchResult {
        let me = self.distributor();
        let action = AuditAction::Distribute {
            batch_index: batch.index,
        };

        match self.gateway.processed(range.commitment_key(), batch.leaf_hash).await {
            Ok(true) => {
                debug!(batch = batch.index, "batch already processed");
                return BatchResult::AlreadySettled;
            }
            Ok(false) => {}
            Err(e) => {
                let reason = format!("processed check failed: {e:#}");
                warn!(batch = batch.index, %reason);
                self.record(AuditEntry::failed(range, action, me, reason.clone())).await;
                return BatchResult::Failed { reason };
            }
        }

        let proof = tree.proof(batch.index).unwrap_or_default();
        if !MerkleTree::verify(batch.leaf_hash, &proof, tree.root()) {
            let err = DistributionError::ProofInvalid {
                range,
                batch_index: batch.index,
                leaf: batch.leaf_hash,
            };
            error!(error = %err, "refusing to submit batch");
            self.record(AuditEntry::failed(range, action, me, err.to_string())).await;
            return BatchResult::Failed {
                reason: err.to_string(),
            };
        }

        let recipients = batch.recipients();
        let worker_rewards = batch.worker_rewards();
        let staker_rewards = batch.staker_rewards();
        let gateway = self.gateway.as_ref();
        let (range_ref, recipients, worker_rewards, staker_rewards, proof) = (
            &range,
            recipients.as_slice(),
            worker_rewards.as_slice(),
            staker_rewards.as_slice(),
            proof.as_slice(),
        );

        let submitted = self
            .submit(move |_| gateway.distribute(range_ref, recipients, worker_rewards, staker_rewards, proof))
            .await;

        match submitted.map_err(DistributionError::from) {
            Ok(tx_hash) => {
                info!(batch = batch.index, recipients = batch.len(), tx_hash = ?tx_hash, "distributed batch");
                self.record(AuditEntry::succeeded(range, action, me, Some(tx_hash))).await;
                BatchResult::Settled { tx_hash }
            }
            Err(DistributionError::AlreadySettled) => {
                debug!(batch = batch.index, "batch settled concurrently");
                self.record(AuditEntry::skipped(range, action, me, "already processed")).await;
                BatchResult::AlreadySettled
            }
            Err(err) => {
                warn!(batch = batch.index, error = %err, "batch distribution failed");
                self.record(AuditEntry::failed(range, action, me, err.to_string())).await;
                BatchResult::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Tree for `range`, built from a fresh metrics read unless cached.
    async fn prepare_tree(&self, range: EpochRange) -> Result<Arc<RewardTree>> {
        if let Some(tree) = self.trees.read().await.get(&range) {
            return Ok(tree.clone());
        }
        self.compute_tree(range).await
    }

    async fn compute_tree(&self, range: EpochRange) -> Result<Arc<RewardTree>> {
        let window = self.metrics.activity(&range).await.map_err(upstream)?;
        if window.workers.is_empty() {
            return Err(DistributionError::InsufficientData(range));
        }

        let bond_amount = self.gateway.bond_amount().await.map_err(upstream)?;
        let metrics = self
            .metrics_service
            .collect(self.gateway.as_ref(), &window)
            .await
            .map_err(upstream)?;
        match self.gateway.active_worker_count().await {
            Ok(active) => debug!(measured = window.workers.len(), rewarded = metrics.len(), active, "worker coverage"),
            Err(e) => debug!(error = %e, "active worker count unavailable"),
        }

        let params = NetworkParams {
            bond_amount,
            epoch_seconds: window.duration_secs(),
            target_apr: self.rewards.target_apr,
        };
        let rewards = self.engine.calculate(&metrics, &params);
        let payable = rewards.payable();
        if payable.is_empty() {
            return Err(DistributionError::InsufficientData(range));
        }

        let (total_workers, total_rewards) = (payable.len(), rewards.total);
        self.update_status(range, move |s| {
            s.transition(DistributionState::GeneratingTree);
            s.total_workers = total_workers;
            s.total_rewards = total_rewards;
        })
        .await;

        let tree = Arc::new(RewardTree::build(range, &payable, self.batching.batch_size)?);
        let total_batches = tree.total_batches();
        self.update_status(range, move |s| s.total_batches = total_batches).await;
        info!(
            root = ?tree.root(),
            total_batches,
            total_workers,
            total_rewards,
            cap = rewards.cap,
            "built reward tree"
        );

        self.trees.write().await.insert(range, tree.clone());
        Ok(tree)
    }

    /// Forget trees and approvals of ranges that are neither open on the
    /// ledger nor being worked on by this process.
    async fn prune_caches(&self, open: &[EpochRange]) {
        let in_flight = lock(&self.in_flight).clone();
        let keep = |range: &EpochRange| open.contains(range) || in_flight.contains(range);
        lock(&self.approved).retain(|r| keep(r));
        self.trees.write().await.retain(|r, _| keep(r));
    }

    /// Recompute the tree and insist it matches what was committed.
    async fn verified_tree(&self, commitment: &Commitment) -> Result<Arc<RewardTree>> {
        let range = commitment.range;
        self.begin(range).await;

        let tree = match self.prepare_tree(range).await {
            Ok(tree) => tree,
            Err(DistributionError::InsufficientData(_)) => {
                let err = DistributionError::RootMismatch {
                    range,
                    expected: commitment.merkle_root,
                    computed: Default::default(),
                };
                error!(error = %err, "committed range has no rewards locally");
                self.fail(range, &err).await;
                return Err(err);
            }
            Err(e) => {
                self.fail(range, &e).await;
                return Err(e);
            }
        };

        if tree.root() != commitment.merkle_root || tree.total_batches() as u32 != commitment.total_batches {
            let err = DistributionError::RootMismatch {
                range,
                expected: commitment.merkle_root,
                computed: tree.root(),
            };
            error!(
                error = %err,
                committed_batches = commitment.total_batches,
                local_batches = tree.total_batches(),
                "reward tree differs from the commitment"
            );
            self.trees.write().await.remove(&range);
            self.fail(range, &err).await;
            return Err(err);
        }
        Ok(tree)
    }

    /// Write with a per-attempt timeout, resubmitting on transient errors.
    async fn submit<T, F, Fut>(&self, mut op: F) -> std::result::Result<T, GatewayError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, GatewayError>>,
    {
        let timeout = self.config.write_timeout();
        retry(&self.config.write_retry, GatewayError::is_transient, move |attempt| {
            let write = op(attempt);
            async move {
                match tokio::time::timeout(timeout, write).await {
                    Ok(result) => result,
                    Err(_) => Err(GatewayError::Timeout(timeout)),
                }
            }
        })
        .await
    }

    fn metadata_link(&self, range: &EpochRange) -> String {
        if self.config.metadata_base_url.is_empty() {
            return String::new();
        }
        format!("{}/{}", self.config.metadata_base_url.trim_end_matches('/'), range)
    }

    async fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.append(entry).await {
            warn!(error = %e, "failed to append audit entry");
        }
    }

    async fn update_status<F>(&self, range: EpochRange, update: F)
    where
        F: FnOnce(&mut DistributionStatus) + Send,
    {
        let existing = match self.status.get(&range).await {
            Ok(status) => status,
            Err(e) => {
                warn!(%range, error = %e, "failed to read distribution status");
                None
            }
        };
        let mut status = existing.unwrap_or_else(|| DistributionStatus::new(range));
        update(&mut status);
        status.touch();
        if let Err(e) = self.status.upsert(status).await {
            warn!(%range, error = %e, "failed to record distribution status");
        }
    }

    /// Start or restart work on `range`.
    async fn begin(&self, range: EpochRange) {
        self.enter(range, DistributionState::Calculating).await;
    }

    async fn enter(&self, range: EpochRange, state: DistributionState) {
        self.update_status(range, move |s| {
            if s.state != state && !s.transition(state) {
                debug!(from = %s.state, to = %state, "status transition ignored");
            }
        })
        .await;
    }

    async fn fail(&self, range: EpochRange, err: &DistributionError) {
        self.abandon(range, err.to_string()).await;
    }

    /// Close this process's attempt on `range`. The approve loop restarts it
    /// if the range shows up as an open commitment.
    async fn abandon(&self, range: EpochRange, reason: impl Into<String>) {
        let reason = reason.into();
        self.update_status(range, move |s| {
            if !s.fail(reason) {
                debug!(state = %s.state, "status already final");
            }
        })
        .await;
    }
}

impl<G, M> DistributionCoordinator<G, M>
where
    G: ChainGateway + 'static,
    M: WorkerMetricsView + 'static,
{
    /// Run the commit and approve loops until the handles are aborted.
    pub fn spawn(self: &Arc<Self>) -> CoordinatorHandles {
        CoordinatorHandles {
            commit: tokio::spawn(self.clone().commit_loop()),
            approve: tokio::spawn(self.clone().approve_loop()),
        }
    }

    async fn commit_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.commit_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.commit_cycle().await {
                Ok(PhaseOutcome::NotEligible { reason }) => debug!(%reason, "commit skipped"),
                Ok(outcome) => info!(?outcome, "commit pass finished"),
                Err(e) if e.is_transient() => warn!(error = %e, "commit pass deferred"),
                Err(e) => error!(error = %e, "commit pass failed"),
            }
        }
    }

    async fn approve_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.approve_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.approve_cycle().await {
                warn!(error = %e, "approve pass failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(from: u64, to: u64) -> EpochRange {
        EpochRange::new(from, to).unwrap()
    }

    #[test]
    fn next_range_waits_for_the_epoch_to_end() {
        assert_eq!(next_range(1000, 1000, 1999, 0), None);
        assert_eq!(next_range(1000, 1000, 2000, 0), Some(range(1000, 2000)));
        assert_eq!(next_range(1000, 1000, 2004, 5), None);
        assert_eq!(next_range(1000, 1000, 2005, 5), Some(range(1000, 2000)));
    }

    #[test]
    fn next_range_rejects_zero_length_epochs() {
        assert_eq!(next_range(1000, 0, 5000, 0), None);
        assert_eq!(next_range(u64::MAX, 10, u64::MAX, 0), None);
    }

    #[test]
    fn advance_range_shifts_by_own_length() {
        assert_eq!(advance_range(range(1000, 2000), 0), range(1000, 2000));
        assert_eq!(advance_range(range(1000, 2000), 1), range(2000, 3000));
        assert_eq!(advance_range(range(1000, 2000), 3), range(4000, 5000));
    }

    #[test]
    fn in_flight_guard_is_exclusive_and_released_on_drop() {
        let ranges = Mutex::new(HashSet::new());
        let guard = InFlight::acquire(&ranges, range(0, 10));
        assert!(guard.is_some());
        assert!(InFlight::acquire(&ranges, range(0, 10)).is_none());
        assert!(InFlight::acquire(&ranges, range(10, 20)).is_some());
        drop(guard);
        assert!(InFlight::acquire(&ranges, range(0, 10)).is_some());
    }

    #[tokio::test]
    async fn approve_cycle_forgets_settled_ranges() {
        use crate::repositories::memory::{
            InMemoryAuditLog, InMemoryLedger, InMemoryStatusStore, LedgerParams, StaticMetricsView,
        };
        use distribution_models::{Address, LedgerWorkerId, RewardAssignment, WorkerId};

        let ledger = InMemoryLedger::new(LedgerParams::default());
        let coordinator = DistributionCoordinator::new(
            Arc::new(ledger.handle(Address::from_low_u64_be(1))),
            Arc::new(StaticMetricsView::new()),
            Arc::new(InMemoryStatusStore::new()),
            Arc::new(InMemoryAuditLog::new()),
            &DistributorConfig::default(),
        );

        let (stale, busy) = (range(0, 10), range(10, 20));
        let assignment = RewardAssignment {
            worker_id: LedgerWorkerId(1),
            peer_id: WorkerId::new("peer-1"),
            worker_reward: 10,
            staker_reward: 5,
        };
        let tree = Arc::new(RewardTree::build(stale, &[assignment], 10).unwrap());
        coordinator.trees.write().await.insert(stale, tree);
        lock(&coordinator.approved).extend([stale, busy]);

        let _guard = InFlight::acquire(&coordinator.in_flight, busy).unwrap();
        assert!(coordinator.approve_cycle().await.unwrap().is_empty());

        assert!(coordinator.trees.read().await.is_empty());
        assert_eq!(*lock(&coordinator.approved), HashSet::from([busy]));
    }
}
