use std::fmt;

use chrono::{DateTime, Utc};
use distribution_models::{Address, EpochRange, TxHash};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditAction {
    Commit,
    Approve,
    Distribute { batch_index: usize },
}

impl AuditAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Approve => "approve",
            Self::Distribute { .. } => "distribute",
        }
    }

    pub fn batch_index(&self) -> Option<usize> {
        match self {
            Self::Distribute { batch_index } => Some(*batch_index),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.batch_index() {
            Some(index) => write!(f, "{}[{}]", self.name(), index),
            None => f.write_str(self.name()),
        }
    }
}

/// One settlement attempt, as recorded for external audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub range: EpochRange,
    pub action: AuditAction,
    pub author: Address,
    pub tx_hash: Option<TxHash>,
    pub success: bool,
    pub reason: Option<String>,
}

impl AuditEntry {
    pub fn succeeded(range: EpochRange, action: AuditAction, author: Address, tx_hash: Option<TxHash>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            range,
            action,
            author,
            tx_hash,
            success: true,
            reason: None,
        }
    }

    pub fn failed(range: EpochRange, action: AuditAction, author: Address, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            range,
            action,
            author,
            tx_hash: None,
            success: false,
            reason: Some(reason.into()),
        }
    }

    /// Success-equivalent outcome where nothing was submitted.
    pub fn skipped(range: EpochRange, action: AuditAction, author: Address, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::succeeded(range, action, author, None)
        }
    }
}
