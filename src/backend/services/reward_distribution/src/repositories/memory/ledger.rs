//! Settlement ledger kept in process memory.
//!
//! Enforces the same rules as the on-chain distributor contract: round-robin
//! commit slots, one root per range, an approval threshold before any batch
//! is paid, and at most one payout per leaf. Used by the devnet and tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use distribution_models::{Address, Commitment, EpochRange, LedgerWorkerId, TxHash, WorkerId};
use sp_core::H256;

use crate::repositories::traits::ChainGateway;
use crate::utils::crypto::CryptoUtils;
use crate::utils::errors::{FetchError, GatewayError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerParams {
    pub epoch_length: u64,
    pub bond_amount: u128,
    /// Blocks each distributor holds the commit slot for.
    pub round_robin_window: u64,
    pub required_approvals: u32,
    /// First block that will ever be rewarded.
    pub genesis_block: u64,
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self {
            epoch_length: 1000,
            bond_amount: 100_000,
            round_robin_window: 100,
            required_approvals: 1,
            genesis_block: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub worker: u128,
    pub staker: u128,
}

struct Record {
    commitment: Commitment,
    approvers: HashSet<Address>,
}

#[derive(Default)]
struct State {
    current_block: u64,
    last_rewarded_block: u64,
    distributors: Vec<Address>,
    workers: HashMap<WorkerId, LedgerWorkerId>,
    stakes: HashMap<LedgerWorkerId, std::result::Result<u128, FetchError>>,
    commitments: HashMap<H256, Record>,
    committed: Vec<EpochRange>,
    processed: HashSet<(H256, H256)>,
    balances: HashMap<LedgerWorkerId, Balance>,
    injected_failures: VecDeque<GatewayError>,
    nonce: u64,
}

impl State {
    fn next_tx(&mut self) -> TxHash {
        self.nonce += 1;
        CryptoUtils::keccak(&self.nonce.to_be_bytes())
    }

    fn slot_holder(&self, window: u64) -> Option<Address> {
        if self.distributors.is_empty() || window == 0 {
            return None;
        }
        let slot = (self.current_block / window) % self.distributors.len() as u64;
        self.distributors.get(slot as usize).copied()
    }
}

/// Shared ledger; every [`LedgerHandle`] signs as one distributor.
#[derive(Clone)]
pub struct InMemoryLedger {
    params: LedgerParams,
    state: Arc<Mutex<State>>,
}

impl InMemoryLedger {
    pub fn new(params: LedgerParams) -> Self {
        let state = State {
            current_block: params.genesis_block,
            last_rewarded_block: params.genesis_block,
            ..State::default()
        };
        Self {
            params,
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn params(&self) -> &LedgerParams {
        &self.params
    }

    pub fn handle(&self, signer: Address) -> LedgerHandle {
        LedgerHandle {
            ledger: self.clone(),
            signer,
        }
    }

    pub fn add_distributor(&self, distributor: Address) {
        let mut state = self.state();
        if !state.distributors.contains(&distributor) {
            state.distributors.push(distributor);
        }
    }

    pub fn distributors(&self) -> Vec<Address> {
        self.state().distributors.clone()
    }

    /// Register a worker and return the ledger id assigned to it.
    pub fn register_worker(&self, peer_id: WorkerId, stake: u128) -> LedgerWorkerId {
        let mut state = self.state();
        if let Some(id) = state.workers.get(&peer_id) {
            return *id;
        }
        let id = LedgerWorkerId(state.workers.len() as u64 + 1);
        state.workers.insert(peer_id, id);
        state.stakes.insert(id, Ok(stake));
        id
    }

    pub fn set_stake(&self, worker: LedgerWorkerId, stake: std::result::Result<u128, FetchError>) {
        self.state().stakes.insert(worker, stake);
    }

    pub fn current_block(&self) -> u64 {
        self.state().current_block
    }

    pub fn advance_blocks(&self, blocks: u64) -> u64 {
        let mut state = self.state();
        state.current_block = state.current_block.saturating_add(blocks);
        state.current_block
    }

    pub fn set_block(&self, block: u64) {
        self.state().current_block = block;
    }

    pub fn last_rewarded_block(&self) -> u64 {
        self.state().last_rewarded_block
    }

    pub fn commitment_of(&self, range: &EpochRange) -> Commitment {
        self.state()
            .commitments
            .get(&range.commitment_key())
            .map(|r| r.commitment.clone())
            .unwrap_or_else(|| Commitment::absent(*range))
    }

    pub fn balance(&self, worker: LedgerWorkerId) -> Balance {
        self.state().balances.get(&worker).copied().unwrap_or_default()
    }

    pub fn total_paid(&self) -> u128 {
        self.state()
            .balances
            .values()
            .map(|b| b.worker.saturating_add(b.staker))
            .sum()
    }

    /// Make the next write, from any signer, fail with `err`.
    pub fn inject_write_failure(&self, err: GatewayError) {
        self.state().injected_failures.push_back(err);
    }

    fn take_injected(&self) -> std::result::Result<(), GatewayError> {
        match self.state().injected_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn commit(
        &self,
        signer: Address,
        range: &EpochRange,
        root: H256,
        total_batches: u32,
        metadata_link: &str,
    ) -> std::result::Result<TxHash, GatewayError> {
        self.take_injected()?;
        let mut state = self.state();

        if !state.distributors.contains(&signer) {
            return Err(GatewayError::Rejected(format!("{signer:?} is not a distributor")));
        }
        if state.slot_holder(self.params.round_robin_window) != Some(signer) {
            return Err(GatewayError::NotEligible("not in commit window".to_string()));
        }
        let key = range.commitment_key();
        if state.commitments.contains_key(&key) {
            return Err(GatewayError::Collision(format!("{range} already committed")));
        }
        if range.from_block < state.last_rewarded_block {
            return Err(GatewayError::Collision(format!(
                "{range} overlaps rewarded blocks up to {}",
                state.last_rewarded_block
            )));
        }
        if range.from_block > state.last_rewarded_block {
            return Err(GatewayError::Rejected(format!(
                "{range} leaves a gap after block {}",
                state.last_rewarded_block
            )));
        }
        if range.to_block > state.current_block {
            return Err(GatewayError::Rejected(format!("{range} has not ended")));
        }
        // an epoch without rewards is closed by a batchless commitment
        if (total_batches == 0) != root.is_zero() {
            return Err(GatewayError::Rejected(
                "only a commitment without batches may carry the zero root".to_string(),
            ));
        }

        state.commitments.insert(
            key,
            Record {
                commitment: Commitment {
                    range: *range,
                    exists: true,
                    merkle_root: root,
                    total_batches,
                    processed_batches: 0,
                    approval_count: 1,
                    committer: Some(signer),
                    metadata_link: metadata_link.to_string(),
                },
                approvers: HashSet::from([signer]),
            },
        );
        state.committed.push(*range);
        state.last_rewarded_block = range.to_block;
        Ok(state.next_tx())
    }

    fn approve(&self, signer: Address, range: &EpochRange) -> std::result::Result<TxHash, GatewayError> {
        self.take_injected()?;
        let mut state = self.state();

        if !state.distributors.contains(&signer) {
            return Err(GatewayError::Rejected(format!("{signer:?} is not a distributor")));
        }
        let record = state
            .commitments
            .get_mut(&range.commitment_key())
            .ok_or_else(|| GatewayError::Rejected(format!("no commitment for {range}")))?;
        if !record.approvers.insert(signer) {
            return Err(GatewayError::AlreadyDone(format!("{signer:?} already approved {range}")));
        }
        record.commitment.approval_count += 1;
        Ok(state.next_tx())
    }

    fn distribute(
        &self,
        signer: Address,
        range: &EpochRange,
        recipients: &[LedgerWorkerId],
        worker_rewards: &[u128],
        staker_rewards: &[u128],
        proof: &[H256],
    ) -> std::result::Result<TxHash, GatewayError> {
        self.take_injected()?;
        let leaf = CryptoUtils::leaf_hash(recipients, worker_rewards, staker_rewards)
            .map_err(|e| GatewayError::Rejected(e.to_string()))?;
        let key = range.commitment_key();
        let required = self.params.required_approvals;
        let mut state = self.state();

        if !state.distributors.contains(&signer) {
            return Err(GatewayError::Rejected(format!("{signer:?} is not a distributor")));
        }
        let root = {
            let record = state
                .commitments
                .get(&key)
                .ok_or_else(|| GatewayError::Rejected(format!("no commitment for {range}")))?;
            if record.commitment.approval_count < required {
                return Err(GatewayError::NotEligible(format!(
                    "{range} has {}/{} approvals",
                    record.commitment.approval_count, required
                )));
            }
            record.commitment.merkle_root
        };
        if state.processed.contains(&(key, leaf)) {
            return Err(GatewayError::AlreadyDone(format!("batch {leaf:?} already processed")));
        }
        if !CryptoUtils::verify_merkle_proof(root, proof, leaf) {
            return Err(GatewayError::Rejected("invalid merkle proof".to_string()));
        }

        for ((worker, reward), staker) in recipients.iter().zip(worker_rewards).zip(staker_rewards) {
            let balance = state.balances.entry(*worker).or_default();
            balance.worker = balance.worker.saturating_add(*reward);
            balance.staker = balance.staker.saturating_add(*staker);
        }
        state.processed.insert((key, leaf));
        if let Some(record) = state.commitments.get_mut(&key) {
            record.commitment.processed_batches += 1;
        }
        Ok(state.next_tx())
    }
}

/// View of the [`InMemoryLedger`] that signs as `signer`.
#[derive(Clone)]
pub struct LedgerHandle {
    ledger: InMemoryLedger,
    signer: Address,
}

impl LedgerHandle {
    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }
}

#[async_trait]
impl ChainGateway for LedgerHandle {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn current_block(&self) -> Result<u64> {
        Ok(self.ledger.current_block())
    }

    async fn epoch_length(&self) -> Result<u64> {
        Ok(self.ledger.params.epoch_length)
    }

    async fn bond_amount(&self) -> Result<u128> {
        Ok(self.ledger.params.bond_amount)
    }

    async fn last_rewarded_block(&self) -> Result<u64> {
        Ok(self.ledger.last_rewarded_block())
    }

    async fn required_approvals(&self) -> Result<u32> {
        Ok(self.ledger.params.required_approvals)
    }

    async fn active_worker_count(&self) -> Result<u64> {
        Ok(self.ledger.state().workers.len() as u64)
    }

    async fn can_commit(&self, distributor: Address) -> Result<bool> {
        let state = self.ledger.state();
        Ok(state.slot_holder(self.ledger.params.round_robin_window) == Some(distributor))
    }

    async fn is_committed(&self, range: &EpochRange) -> Result<bool> {
        Ok(self.ledger.commitment_of(range).exists)
    }

    async fn commitment(&self, range: &EpochRange) -> Result<Commitment> {
        Ok(self.ledger.commitment_of(range))
    }

    async fn open_commitments(&self) -> Result<Vec<EpochRange>> {
        let state = self.ledger.state();
        Ok(state
            .committed
            .iter()
            .filter(|range| {
                state
                    .commitments
                    .get(&range.commitment_key())
                    .map_or(false, |r| !r.commitment.is_fully_processed())
            })
            .copied()
            .collect())
    }

    async fn processed(&self, commitment_key: H256, leaf_hash: H256) -> Result<bool> {
        Ok(self.ledger.state().processed.contains(&(commitment_key, leaf_hash)))
    }

    async fn worker_id_of(&self, peer_id: &WorkerId) -> Result<Option<LedgerWorkerId>> {
        Ok(self.ledger.state().workers.get(peer_id).copied())
    }

    async fn stakes(&self, workers: &[LedgerWorkerId]) -> HashMap<LedgerWorkerId, std::result::Result<u128, FetchError>> {
        let state = self.ledger.state();
        workers
            .iter()
            .map(|id| {
                let stake = state
                    .stakes
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| Err(FetchError::Reverted(format!("unknown worker {id}"))));
                (*id, stake)
            })
            .collect()
    }

    async fn commit_root(
        &self,
        range: &EpochRange,
        root: H256,
        total_batches: u32,
        metadata_link: &str,
    ) -> std::result::Result<TxHash, GatewayError> {
        self.ledger.commit(self.signer, range, root, total_batches, metadata_link)
    }

    async fn approve_root(&self, range: &EpochRange) -> std::result::Result<TxHash, GatewayError> {
        self.ledger.approve(self.signer, range)
    }

    async fn distribute(
        &self,
        range: &EpochRange,
        recipients: &[LedgerWorkerId],
        worker_rewards: &[u128],
        staker_rewards: &[u128],
        proof: &[H256],
    ) -> std::result::Result<TxHash, GatewayError> {
        self.ledger
            .distribute(self.signer, range, recipients, worker_rewards, staker_rewards, proof)
    }
}
