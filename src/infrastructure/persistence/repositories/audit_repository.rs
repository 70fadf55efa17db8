use crate::domain::deletion::{DeletionAuditEntry, DeletionResult, DeletionStrategy};
use crate::domain::repositories::DeletionAuditRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

pub struct SqliteDeletionAuditRepository {
    pool: SqlitePool,
}

impl SqliteDeletionAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeletionAuditRepository for SqliteDeletionAuditRepository {
    async fn record(&self, entry: &DeletionAuditEntry) -> Result<()> {
        let result_json =
            serde_json::to_string(&entry.result).context("Failed to serialize deletion result")?;

        sqlx::query(
            r#"
            INSERT INTO deletion_audit (
                operation_id,
                recorded_at,
                strategy,
                dry_run,
                success,
                final_state,
                deleted_count,
                preserved_count,
                error_count,
                result_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(operation_id) DO NOTHING
            "#,
        )
        .bind(entry.operation_id.to_string())
        .bind(entry.recorded_at.timestamp_millis())
        .bind(entry.strategy.to_string())
        .bind(entry.dry_run)
        .bind(entry.success)
        .bind(entry.final_state.to_string())
        .bind(entry.deleted_count as i64)
        .bind(entry.preserved_count as i64)
        .bind(entry.error_count as i64)
        .bind(result_json)
        .execute(&self.pool)
        .await
        .context("Failed to save deletion audit entry")?;

        info!("Persisted deletion audit entry {}", entry.operation_id);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<DeletionAuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT operation_id, recorded_at, strategy, result_json
            FROM deletion_audit
            ORDER BY recorded_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load deletion audit entries")?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let operation_id = Uuid::parse_str(row.try_get("operation_id")?)
                .context("Invalid operation id in audit log")?;
            let strategy = DeletionStrategy::from_str(row.try_get("strategy")?)?;
            let result: DeletionResult = serde_json::from_str(row.try_get("result_json")?)
                .context("Failed to parse stored deletion result")?;

            entries.push(DeletionAuditEntry {
                operation_id,
                recorded_at: DateTime::from_timestamp_millis(row.try_get("recorded_at")?)
                    .unwrap_or_default(),
                strategy,
                dry_run: result.dry_run,
                success: result.success,
                final_state: result.final_state,
                deleted_count: result.deleted_items.len(),
                preserved_count: result.preserved_items.len(),
                error_count: result.errors.len(),
                result,
            });
        }
        Ok(entries)
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM deletion_audit")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count as usize)
    }
}
