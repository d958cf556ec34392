use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use distribution_models::{Address, EpochRange, TxHash};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::audit::{AuditAction, AuditEntry};
use crate::repositories::traits::AuditLog;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS distribution_audit (
        id UUID PRIMARY KEY,
        recorded_at TIMESTAMPTZ NOT NULL,
        from_block BIGINT NOT NULL,
        to_block BIGINT NOT NULL,
        action TEXT NOT NULL,
        batch_index BIGINT,
        author BYTEA NOT NULL,
        tx_hash BYTEA,
        success BOOLEAN NOT NULL,
        reason TEXT
    )
"#;

pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the audit table if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

fn to_i64(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value).with_context(|| format!("{field} {value} does not fit in BIGINT"))
}

fn entry_from_row(row: &PgRow) -> Result<AuditEntry> {
    let from_block: i64 = row.try_get("from_block")?;
    let to_block: i64 = row.try_get("to_block")?;
    let range = EpochRange::new(from_block as u64, to_block as u64)?;

    let action = match (row.try_get::<String, _>("action")?.as_str(), row.try_get::<Option<i64>, _>("batch_index")?) {
        ("commit", _) => AuditAction::Commit,
        ("approve", _) => AuditAction::Approve,
        ("distribute", Some(index)) => AuditAction::Distribute {
            batch_index: index as usize,
        },
        (other, index) => bail!("unknown audit action {other:?} (batch {index:?})"),
    };

    let author: Vec<u8> = row.try_get("author")?;
    if author.len() != Address::len_bytes() {
        bail!("author column holds {} bytes", author.len());
    }
    let tx_hash = match row.try_get::<Option<Vec<u8>>, _>("tx_hash")? {
        Some(bytes) if bytes.len() == TxHash::len_bytes() => Some(TxHash::from_slice(&bytes)),
        Some(bytes) => bail!("tx_hash column holds {} bytes", bytes.len()),
        None => None,
    };

    Ok(AuditEntry {
        id: row.try_get::<Uuid, _>("id")?,
        recorded_at: row.try_get::<DateTime<Utc>, _>("recorded_at")?,
        range,
        action,
        author: Address::from_slice(&author),
        tx_hash,
        success: row.try_get("success")?,
        reason: row.try_get("reason")?,
    })
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        let batch_index = entry.action.batch_index().map(|i| i as i64);

        sqlx::query(
            r#"
            INSERT INTO distribution_audit (
                id, recorded_at, from_block, to_block, action,
                batch_index, author, tx_hash, success, reason
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(entry.recorded_at)
        .bind(to_i64(entry.range.from_block, "from_block")?)
        .bind(to_i64(entry.range.to_block, "to_block")?)
        .bind(entry.action.name())
        .bind(batch_index)
        .bind(entry.author.as_bytes().to_vec())
        .bind(entry.tx_hash.map(|h| h.as_bytes().to_vec()))
        .bind(entry.success)
        .bind(entry.reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn entries(&self, range: Option<EpochRange>) -> Result<Vec<AuditEntry>> {
        let rows = match range {
            Some(range) => {
                sqlx::query(
                    r#"
                    SELECT * FROM distribution_audit
                    WHERE from_block = $1 AND to_block = $2
                    ORDER BY recorded_at
                    "#,
                )
                .bind(to_i64(range.from_block, "from_block")?)
                .bind(to_i64(range.to_block, "to_block")?)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM distribution_audit ORDER BY recorded_at")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(entry_from_row).collect()
    }
}
