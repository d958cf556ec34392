use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use distribution_models::{DistributionStatus, EpochRange};
use tokio::sync::RwLock;

use crate::repositories::traits::StatusStore;

#[derive(Default)]
pub struct InMemoryStatusStore {
    statuses: RwLock<BTreeMap<EpochRange, DistributionStatus>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn get(&self, range: &EpochRange) -> Result<Option<DistributionStatus>> {
        Ok(self.statuses.read().await.get(range).cloned())
    }

    async fn list(&self) -> Result<Vec<DistributionStatus>> {
        Ok(self.statuses.read().await.values().cloned().collect())
    }

    async fn upsert(&self, status: DistributionStatus) -> Result<()> {
        self.statuses.write().await.insert(status.range, status);
        Ok(())
    }

    async fn evict_expired(&self, retention: Duration) -> Result<usize> {
        let now = Utc::now();
        let mut statuses = self.statuses.write().await;
        let before = statuses.len();
        statuses.retain(|_, status| {
            let expired = status.state.is_terminal()
                && (now - status.updated_at)
                    .to_std()
                    .map(|age| age > retention)
                    .unwrap_or(false);
            !expired
        });
        Ok(before - statuses.len())
    }
}
