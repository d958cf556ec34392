use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use distribution_models::{DistributionState, DistributionStatus, EpochRange};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::audit::AuditEntry;
use crate::models::report::PhaseOutcome;
use crate::repositories::traits::{AuditLog, ChainGateway, StatusStore, WorkerMetricsView};
use crate::services::coordinator::DistributionCoordinator;
use crate::utils::errors::DistributionError;

/// Something that can settle a range on demand.
#[async_trait]
pub trait DistributionTrigger: Send + Sync {
    async fn trigger(&self, range: EpochRange) -> std::result::Result<PhaseOutcome, DistributionError>;
}

#[async_trait]
impl<G, M> DistributionTrigger for DistributionCoordinator<G, M>
where
    G: ChainGateway + 'static,
    M: WorkerMetricsView + 'static,
{
    async fn trigger(&self, range: EpochRange) -> std::result::Result<PhaseOutcome, DistributionError> {
        DistributionCoordinator::trigger(self, range).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub by_state: BTreeMap<DistributionState, usize>,
}

/// Operator-facing view of distributions.
pub struct AdminService {
    status: Arc<dyn StatusStore>,
    audit: Arc<dyn AuditLog>,
    trigger: Arc<dyn DistributionTrigger>,
}

impl AdminService {
    pub fn new(
        status: Arc<dyn StatusStore>,
        audit: Arc<dyn AuditLog>,
        trigger: Arc<dyn DistributionTrigger>,
    ) -> Self {
        Self {
            status,
            audit,
            trigger,
        }
    }

    /// Start settling `range` in the background.
    pub fn trigger(&self, range: EpochRange) {
        let trigger = self.trigger.clone();
        tokio::spawn(async move {
            match trigger.trigger(range).await {
                Ok(outcome) => info!(%range, ?outcome, "triggered distribution finished"),
                Err(e) => warn!(%range, error = %e, "triggered distribution failed"),
            }
        });
    }

    pub async fn trigger_and_wait(&self, range: EpochRange) -> std::result::Result<PhaseOutcome, DistributionError> {
        self.trigger.trigger(range).await
    }

    /// Status of the range identified as `"{from}-{to}"`.
    pub async fn status(&self, range_id: &str) -> Result<Option<DistributionStatus>> {
        let range: EpochRange = range_id
            .parse()
            .with_context(|| format!("invalid range id {range_id:?}"))?;
        self.status.get(&range).await
    }

    pub async fn list(&self) -> Result<Vec<DistributionStatus>> {
        self.status.list().await
    }

    pub async fn summary(&self) -> Result<StatusSummary> {
        let statuses = self.status.list().await?;
        let mut summary = StatusSummary {
            total: statuses.len(),
            ..StatusSummary::default()
        };
        for status in statuses {
            *summary.by_state.entry(status.state).or_default() += 1;
        }
        Ok(summary)
    }

    pub async fn history(&self, range: Option<EpochRange>) -> Result<Vec<AuditEntry>> {
        self.audit.entries(range).await
    }
}
