use std::time::Duration;

use distribution_models::{EpochRange, ModelError};
use sp_core::H256;
use thiserror::Error;

/// Failure of a single ledger read inside a multicall.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("call reverted: {0}")]
    Reverted(String),

    #[error("call failed: {0}")]
    Transport(String),
}

/// Outcome of a rejected ledger write, as reported by the signing gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The effect of the write is already on the ledger.
    #[error("already done: {0}")]
    AlreadyDone(String),

    /// Another distributor settled the same range first.
    #[error("collision: {0}")]
    Collision(String),

    #[error("not eligible: {0}")]
    NotEligible(String),

    #[error("rejected by ledger: {0}")]
    Rejected(String),

    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Errors worth resubmitting within the same cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    #[error("range already settled")]
    AlreadySettled,

    #[error("not eligible: {0}")]
    NotEligible(String),

    #[error("range collision: {0}")]
    Collision(String),

    #[error("merkle proof for batch {batch_index} of {range} does not verify against leaf {leaf:?}")]
    ProofInvalid {
        range: EpochRange,
        batch_index: usize,
        leaf: H256,
    },

    #[error("committed root {expected:?} for {range} differs from recomputed root {computed:?}")]
    RootMismatch {
        range: EpochRange,
        expected: H256,
        computed: H256,
    },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("no rewardable workers in {0}")]
    InsufficientData(EpochRange),

    #[error("cannot build tree with no leaves")]
    EmptyTree,

    #[error("rejected by ledger: {0}")]
    Rejected(String),

    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl DistributionError {
    /// Conditions that resolve themselves on a later poll.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotEligible(_) | Self::UpstreamUnavailable(_))
    }

    /// Defects in tree construction that must never be retried silently.
    pub fn is_correctness_defect(&self) -> bool {
        matches!(self, Self::ProofInvalid { .. } | Self::RootMismatch { .. })
    }
}

impl From<GatewayError> for DistributionError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::AlreadyDone(_) => Self::AlreadySettled,
            GatewayError::Collision(reason) => Self::Collision(reason),
            GatewayError::NotEligible(reason) => Self::NotEligible(reason),
            GatewayError::Rejected(reason) => Self::Rejected(reason),
            err @ (GatewayError::Timeout(_) | GatewayError::Transport(_)) => {
                Self::UpstreamUnavailable(err.to_string())
            }
        }
    }
}

impl From<ModelError> for DistributionError {
    fn from(err: ModelError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Read failures from collaborators are treated as transient.
pub fn upstream(err: anyhow::Error) -> DistributionError {
    DistributionError::UpstreamUnavailable(format!("{err:#}"))
}

pub type Result<T> = std::result::Result<T, DistributionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_map_onto_taxonomy() {
        assert_eq!(
            DistributionError::from(GatewayError::AlreadyDone("approved".into())),
            DistributionError::AlreadySettled
        );
        assert!(matches!(
            DistributionError::from(GatewayError::Collision("committed".into())),
            DistributionError::Collision(_)
        ));
        assert!(DistributionError::from(GatewayError::Timeout(Duration::from_secs(30))).is_transient());
        assert!(DistributionError::from(GatewayError::Transport("reset".into())).is_transient());
        assert!(!DistributionError::from(GatewayError::Rejected("revert".into())).is_transient());
    }

    #[test]
    fn proof_failures_are_correctness_defects() {
        let err = DistributionError::ProofInvalid {
            range: EpochRange::new(1, 2).unwrap(),
            batch_index: 0,
            leaf: H256::zero(),
        };
        assert!(err.is_correctness_defect());
        assert!(!err.is_transient());
    }
}
