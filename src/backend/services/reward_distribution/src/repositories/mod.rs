pub mod memory;
pub mod postgres;
pub mod traits;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::AuditConfig;
use memory::InMemoryAuditLog;
use postgres::PostgresAuditLog;
use traits::AuditLog;

/// Audit log selected by `config`, with its table created when it lives in
/// Postgres.
pub async fn open_audit_log(config: &AuditConfig) -> Result<Arc<dyn AuditLog>> {
    let Some(url) = config.database_url.as_deref() else {
        info!("keeping the audit log in memory");
        return Ok(Arc::new(InMemoryAuditLog::new()));
    };

    let pool = postgres::create_pool(url, config.max_connections)
        .await
        .context("failed to connect to the audit database")?;
    let log = PostgresAuditLog::new(pool);
    log.migrate().await.context("failed to create the audit table")?;
    info!(max_connections = config.max_connections, "writing the audit log to postgres");
    Ok(Arc::new(log))
}
