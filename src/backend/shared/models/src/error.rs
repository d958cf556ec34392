use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid epoch range: from block {from_block} must be below to block {to_block}")]
    InvalidRange { from_block: u64, to_block: u64 },

    #[error("invalid range id '{0}', expected '<from>-<to>'")]
    MalformedRangeId(String),

    #[error("invalid metrics for worker {worker}: {reason}")]
    InvalidMetrics { worker: String, reason: String },
}
