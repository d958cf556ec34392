use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Public-key-derived identity a worker announces on the network.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric identifier assigned to a registered worker by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerWorkerId(pub u64);

impl fmt::Display for LedgerWorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Activity and stake of one registered worker over an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerMetrics {
    pub worker_id: LedgerWorkerId,
    pub peer_id: WorkerId,
    pub bytes_sent: u64,
    pub chunks_read: u64,
    pub total_requests: u64,
    pub valid_requests: u64,
    /// Delegated stake counted by the reward formula (after any per-worker cap).
    pub stake: u128,
    /// Delegated stake as reported by the ledger.
    pub total_delegated_stake: u128,
    /// Observed uptime ratio over the epoch, 0..=1.
    pub liveness_factor: f64,
    /// Tenure coefficient, 0..=1.
    pub tenure_factor: f64,
}

impl WorkerMetrics {
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |reason: &str| ModelError::InvalidMetrics {
            worker: self.peer_id.to_string(),
            reason: reason.to_string(),
        };

        if self.valid_requests > self.total_requests {
            return Err(invalid("valid requests exceed total requests"));
        }
        if !is_unit_interval(self.liveness_factor) {
            return Err(invalid("liveness factor outside 0..=1"));
        }
        if !is_unit_interval(self.tenure_factor) {
            return Err(invalid("tenure factor outside 0..=1"));
        }
        if self.stake > self.total_delegated_stake {
            return Err(invalid("counted stake exceeds delegated stake"));
        }
        Ok(())
    }
}

fn is_unit_interval(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}
