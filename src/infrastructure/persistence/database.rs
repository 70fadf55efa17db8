use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Shared SQLite pool plus schema bootstrap
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        let in_memory = db_url.contains(":memory:");

        // Ensure the directory exists if it's a file path
        if !in_memory
            && let Some(path_part) = db_url.strip_prefix("sqlite://")
        {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let mut options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to ":memory:" opens its own private database
        let max_connections = if in_memory { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // 1. Deletable records of every entity type
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entity_records (
                entity_type TEXT NOT NULL,
                id TEXT NOT NULL,
                display_name TEXT,
                status TEXT NOT NULL,
                is_production BOOLEAN NOT NULL DEFAULT 0,
                payload_json TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (entity_type, id)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create entity_records table")?;

        // 2. References held by a record (referrer depends on referenced)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entity_references (
                referrer_type TEXT NOT NULL,
                referrer_id TEXT NOT NULL,
                referenced_type TEXT NOT NULL,
                referenced_id TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (referrer_type, referrer_id, referenced_type, referenced_id)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create entity_references table")?;

        // Dependents lookups go through the referenced side
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_entity_references_referenced
            ON entity_references (referenced_type, referenced_id, referrer_type);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create entity_references index")?;

        // 3. Deletion audit log
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS deletion_audit (
                operation_id TEXT PRIMARY KEY,
                recorded_at INTEGER NOT NULL,
                strategy TEXT NOT NULL,
                dry_run BOOLEAN NOT NULL,
                success BOOLEAN NOT NULL,
                final_state TEXT NOT NULL,
                deleted_count INTEGER NOT NULL,
                preserved_count INTEGER NOT NULL,
                error_count INTEGER NOT NULL,
                result_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_deletion_audit_recorded
            ON deletion_audit (recorded_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create deletion_audit table")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
