use anyhow::Result;
use async_trait::async_trait;
use distribution_models::EpochRange;
use tokio::sync::RwLock;

use crate::models::audit::AuditEntry;
use crate::repositories::traits::AuditLog;

#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn entries(&self, range: Option<EpochRange>) -> Result<Vec<AuditEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| range.map_or(true, |r| e.range == r))
            .cloned()
            .collect())
    }
}
