use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::domain::repositories::{DeletionAuditRepository, EntityStore};
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::repositories::{
    SqliteDeletionAuditRepository, SqliteEntityStore,
};

pub struct PersistenceHandle {
    pub db: Database,
    pub entity_store: Arc<dyn EntityStore>,
    pub audit_repository: Arc<dyn DeletionAuditRepository>,
}

pub struct PersistenceBootstrap;

impl PersistenceBootstrap {
    pub async fn init(db_url: &str) -> Result<PersistenceHandle> {
        info!("Initializing Database at {}", db_url);

        let db = Database::new(db_url)
            .await
            .context("Failed to initialize database")?;

        let entity_store = Arc::new(SqliteEntityStore::new(db.pool.clone()));
        let audit_repository = Arc::new(SqliteDeletionAuditRepository::new(db.pool.clone()));

        Ok(PersistenceHandle {
            db,
            entity_store,
            audit_repository,
        })
    }
}
