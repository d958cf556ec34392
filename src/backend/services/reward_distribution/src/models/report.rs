use distribution_models::{EpochRange, TxHash};
use serde::{Deserialize, Serialize};
use sp_core::H256;

/// Result of settling one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchResult {
    Settled { tx_hash: TxHash },
    /// Already processed on the ledger; nothing was submitted.
    AlreadySettled,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub index: usize,
    pub leaf_hash: H256,
    pub recipients: usize,
    pub result: BatchResult,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.result, BatchResult::Failed { .. })
    }
}

/// Aggregate of one distribute pass over every batch of a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionReport {
    pub range: EpochRange,
    pub batches: Vec<BatchOutcome>,
}

impl DistributionReport {
    pub fn is_success(&self) -> bool {
        self.batches.iter().all(BatchOutcome::is_success)
    }

    pub fn settled(&self) -> usize {
        self.count(|r| matches!(r, BatchResult::Settled { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|r| matches!(r, BatchResult::AlreadySettled))
    }

    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r, BatchResult::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&BatchResult) -> bool) -> usize {
        self.batches.iter().filter(|b| predicate(&b.result)).count()
    }

    /// One line per failed batch.
    pub fn failure_summary(&self) -> Option<String> {
        let failures: Vec<String> = self
            .batches
            .iter()
            .filter_map(|b| match &b.result {
                BatchResult::Failed { reason } => Some(format!("batch {}: {}", b.index, reason)),
                _ => None,
            })
            .collect();

        if failures.is_empty() {
            None
        } else {
            Some(failures.join("; "))
        }
    }
}

/// What a coordinator phase did for a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PhaseOutcome {
    Committed {
        range: EpochRange,
        root: H256,
        total_batches: u32,
        tx_hash: TxHash,
    },
    Approved {
        range: EpochRange,
    },
    Distributed(DistributionReport),
    /// Nothing left to do for the range.
    AlreadySettled {
        range: EpochRange,
    },
    /// Try again on a later poll.
    NotEligible {
        reason: String,
    },
    /// No worker earned anything in the range.
    NoRewards {
        range: EpochRange,
    },
}
