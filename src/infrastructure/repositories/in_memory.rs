//! In-Memory Repository Implementations
//!
//! Thread-safe, in-memory implementations of the repository traits defined in
//! `domain::repositories`.
//!
//! # Features
//!
//! - **Thread-safe**: Uses `Arc<RwLock>` for concurrent access
//! - **Testing**: Ideal for unit tests and development
//!
//! # Limitations
//!
//! - Data is lost on application restart
//! - No persistence across multiple instances

use crate::domain::deletion::{
    DeletionAuditEntry, EntityRecord, EntityRef, EntityType, RecordSnapshot,
};
use crate::domain::errors::StoreError;
use crate::domain::repositories::{DeletionAuditRepository, EntityStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of EntityStore, keyed by `(type, id)`
#[derive(Clone)]
pub struct InMemoryEntityStore {
    records: Arc<RwLock<BTreeMap<EntityRef, EntityRecord>>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn with_records(records: impl IntoIterator<Item = EntityRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.key(), r)).collect();
        Self {
            records: Arc::new(RwLock::new(map)),
        }
    }

    /// Insert or replace a record
    pub async fn insert(&self, record: EntityRecord) {
        self.records.write().await.insert(record.key(), record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn exists(&self, entity: &EntityRef) -> Result<bool, StoreError> {
        Ok(self.records.read().await.contains_key(entity))
    }

    async fn get(&self, entity: &EntityRef) -> Result<Option<EntityRecord>, StoreError> {
        Ok(self.records.read().await.get(entity).cloned())
    }

    async fn list(&self, entity_type: EntityType) -> Result<Vec<EntityRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.entity_type == entity_type)
            .cloned()
            .collect())
    }

    async fn find_dependents(
        &self,
        target: &EntityRef,
        dependent_type: EntityType,
    ) -> Result<Vec<EntityRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.entity_type == dependent_type && r.references_entity(target))
            .cloned()
            .collect())
    }

    async fn delete(&self, entity: &EntityRef) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(entity).is_some())
    }

    async fn snapshot(&self, entity: &EntityRef) -> Result<Option<RecordSnapshot>, StoreError> {
        match self.records.read().await.get(entity) {
            Some(record) => RecordSnapshot::capture(record).map(Some),
            None => Ok(None),
        }
    }

    async fn detach_reference(
        &self,
        dependent: &EntityRef,
        target: &EntityRef,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(dependent) {
            let before = record.references.len();
            record.references.retain(|r| r != target);
            if record.references.len() != before {
                record.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn restore(&self, snapshot: &RecordSnapshot) -> Result<(), StoreError> {
        let record = snapshot.to_record()?;
        self.records.write().await.insert(record.key(), record);
        Ok(())
    }
}

/// In-memory implementation of DeletionAuditRepository
pub struct InMemoryDeletionAuditRepository {
    entries: Arc<RwLock<Vec<DeletionAuditEntry>>>,
}

impl InMemoryDeletionAuditRepository {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryDeletionAuditRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeletionAuditRepository for InMemoryDeletionAuditRepository {
    async fn record(&self, entry: &DeletionAuditEntry) -> Result<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<DeletionAuditEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}
