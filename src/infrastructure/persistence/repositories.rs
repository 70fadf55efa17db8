mod audit_repository;

pub use audit_repository::SqliteDeletionAuditRepository;

use crate::domain::deletion::{EntityRecord, EntityRef, EntityType, RecordSnapshot, RecordStatus};
use crate::domain::errors::StoreError;
use crate::domain::repositories::EntityStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

const RECORD_COLUMNS: &str = "r.entity_type, r.id, r.display_name, r.status, r.is_production, r.payload_json, r.created_at, r.updated_at";

pub struct SqliteEntityStore {
    pool: SqlitePool,
}

impl SqliteEntityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a record together with its references
    pub async fn save(&self, record: &EntityRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&record.payload).map_err(|e| StoreError::Corrupt {
            entity: record.key().to_string(),
            reason: e.to_string(),
        })?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO entity_records (entity_type, id, display_name, status, is_production, payload_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(entity_type, id) DO UPDATE SET
                display_name = excluded.display_name,
                status = excluded.status,
                is_production = excluded.is_production,
                payload_json = excluded.payload_json,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.entity_type.as_str())
        .bind(&record.id)
        .bind(&record.display_name)
        .bind(record.status.to_string())
        .bind(record.production)
        .bind(payload)
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM entity_references WHERE referrer_type = ? AND referrer_id = ?")
            .bind(record.entity_type.as_str())
            .bind(&record.id)
            .execute(&mut *tx)
            .await?;

        for (position, reference) in record.references.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO entity_references (referrer_type, referrer_id, referenced_type, referenced_id, position)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(record.entity_type.as_str())
            .bind(&record.id)
            .bind(reference.entity_type.as_str())
            .bind(&reference.id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Persisted {}", record.key());
        Ok(())
    }

    async fn references_of(&self, entity: &EntityRef) -> Result<Vec<EntityRef>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT referenced_type, referenced_id FROM entity_references
            WHERE referrer_type = ? AND referrer_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(entity.entity_type.as_str())
        .bind(&entity.id)
        .fetch_all(&self.pool)
        .await?;

        let mut references = Vec::with_capacity(rows.len());
        for row in rows {
            let type_str: String = row.try_get("referenced_type")?;
            let entity_type = parse_entity_type(&type_str, entity)?;
            references.push(EntityRef::new(entity_type, row.try_get::<String, _>("referenced_id")?));
        }
        Ok(references)
    }

    async fn hydrate(&self, rows: Vec<SqliteRow>) -> Result<Vec<EntityRecord>, StoreError> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = map_row_to_record(&row)?;
            record.references = self.references_of(&record.key()).await?;
            records.push(record);
        }
        Ok(records)
    }
}

fn parse_entity_type(value: &str, context: &EntityRef) -> Result<EntityType, StoreError> {
    EntityType::from_str(value).map_err(|e| StoreError::Corrupt {
        entity: context.to_string(),
        reason: e.to_string(),
    })
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

fn map_row_to_record(row: &SqliteRow) -> Result<EntityRecord, StoreError> {
    let type_str: String = row.try_get("entity_type")?;
    let id: String = row.try_get("id")?;
    let corrupt = |reason: String| StoreError::Corrupt {
        entity: format!("{}#{}", type_str, id),
        reason,
    };

    let entity_type = EntityType::from_str(&type_str).map_err(|e| corrupt(e.to_string()))?;
    let status_str: String = row.try_get("status")?;
    let status = RecordStatus::from_str(&status_str).map_err(|e| corrupt(e.to_string()))?;
    let payload_json: String = row.try_get("payload_json")?;
    let payload = serde_json::from_str(&payload_json).map_err(|e| corrupt(e.to_string()))?;
    let created_millis: i64 = row.try_get("created_at")?;
    let created_at = millis_to_datetime(created_millis)
        .ok_or_else(|| corrupt(format!("created_at out of range: {}", created_millis)))?;
    let updated_millis: i64 = row.try_get("updated_at")?;
    let updated_at = millis_to_datetime(updated_millis)
        .ok_or_else(|| corrupt(format!("updated_at out of range: {}", updated_millis)))?;

    Ok(EntityRecord {
        entity_type,
        id: id.clone(),
        display_name: row.try_get("display_name")?,
        status,
        production: row.try_get("is_production")?,
        references: Vec::new(),
        payload,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn exists(&self, entity: &EntityRef) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM entity_records WHERE entity_type = ? AND id = ?")
            .bind(entity.entity_type.as_str())
            .bind(&entity.id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn get(&self, entity: &EntityRef) -> Result<Option<EntityRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM entity_records r WHERE r.entity_type = ? AND r.id = ?",
            RECORD_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(entity.entity_type.as_str())
            .bind(&entity.id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(&self, entity_type: EntityType) -> Result<Vec<EntityRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM entity_records r WHERE r.entity_type = ? ORDER BY r.id ASC",
            RECORD_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(entity_type.as_str())
            .fetch_all(&self.pool)
            .await?;
        self.hydrate(rows).await
    }

    async fn find_dependents(
        &self,
        target: &EntityRef,
        dependent_type: EntityType,
    ) -> Result<Vec<EntityRecord>, StoreError> {
        let query = format!(
            r#"
            SELECT {} FROM entity_records r
            JOIN entity_references ref
                ON ref.referrer_type = r.entity_type AND ref.referrer_id = r.id
            WHERE ref.referenced_type = ? AND ref.referenced_id = ? AND r.entity_type = ?
            ORDER BY r.id ASC
            "#,
            RECORD_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(target.entity_type.as_str())
            .bind(&target.id)
            .bind(dependent_type.as_str())
            .fetch_all(&self.pool)
            .await?;
        self.hydrate(rows).await
    }

    async fn delete(&self, entity: &EntityRef) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM entity_references WHERE referrer_type = ? AND referrer_id = ?")
            .bind(entity.entity_type.as_str())
            .bind(&entity.id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM entity_records WHERE entity_type = ? AND id = ?")
            .bind(entity.entity_type.as_str())
            .bind(&entity.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!("Deleted {}", entity);
        }
        Ok(removed)
    }

    async fn snapshot(&self, entity: &EntityRef) -> Result<Option<RecordSnapshot>, StoreError> {
        match self.get(entity).await? {
            Some(record) => RecordSnapshot::capture(&record).map(Some),
            None => Ok(None),
        }
    }

    async fn detach_reference(
        &self,
        dependent: &EntityRef,
        target: &EntityRef,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM entity_references
            WHERE referrer_type = ? AND referrer_id = ? AND referenced_type = ? AND referenced_id = ?
            "#,
        )
        .bind(dependent.entity_type.as_str())
        .bind(&dependent.id)
        .bind(target.entity_type.as_str())
        .bind(&target.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            sqlx::query("UPDATE entity_records SET updated_at = ? WHERE entity_type = ? AND id = ?")
                .bind(Utc::now().timestamp_millis())
                .bind(dependent.entity_type.as_str())
                .bind(&dependent.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn restore(&self, snapshot: &RecordSnapshot) -> Result<(), StoreError> {
        let record = snapshot.to_record()?;
        self.save(&record).await?;
        info!("Restored {} from snapshot taken at {}", record.key(), snapshot.taken_at);
        Ok(())
    }
}
