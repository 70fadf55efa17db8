//! Repository Pattern Abstractions
//!
//! The deletion subsystem makes no assumption about storage technology beyond
//! the primitives below.
//!
//! # Design
//!
//! - `EntityStore`: per-type record access, dependents lookup, deletion,
//!   snapshots and restore
//! - `DeletionAuditRepository`: persists every executed `DeletionResult`
//!
//! # Implementations
//!
//! - `InMemoryEntityStore` / `InMemoryDeletionAuditRepository`: `Arc<RwLock>`
//!   backed, for tests and single-instance deployments
//! - `SqliteEntityStore` / `SqliteDeletionAuditRepository`: sqlx over SQLite
//!
//! # Example
//!
//! ```rust,no_run
//! use tradelens::domain::deletion::{EntityRef, EntityType};
//! use tradelens::domain::repositories::EntityStore;
//! use tradelens::infrastructure::InMemoryEntityStore;
//!
//! # async {
//! let store = InMemoryEntityStore::new();
//! let trade = EntityRef::new(EntityType::ActiveTrade, "1");
//! let alerts = store.find_dependents(&trade, EntityType::Alert).await.unwrap();
//! # };
//! ```

use crate::domain::deletion::{
    DeletionAuditEntry, EntityRecord, EntityRef, EntityType, RecordSnapshot,
};
use crate::domain::errors::StoreError;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn exists(&self, entity: &EntityRef) -> Result<bool, StoreError>;

    async fn get(&self, entity: &EntityRef) -> Result<Option<EntityRecord>, StoreError>;

    /// All records of one type
    async fn list(&self, entity_type: EntityType) -> Result<Vec<EntityRecord>, StoreError>;

    /// Records of `dependent_type` whose references include `target`
    async fn find_dependents(
        &self,
        target: &EntityRef,
        dependent_type: EntityType,
    ) -> Result<Vec<EntityRecord>, StoreError>;

    /// Returns `false` when the record was already gone
    async fn delete(&self, entity: &EntityRef) -> Result<bool, StoreError>;

    /// `None` when the record does not exist
    async fn snapshot(&self, entity: &EntityRef) -> Result<Option<RecordSnapshot>, StoreError>;

    /// Nulls `dependent`'s reference to `target`; a no-op when absent
    async fn detach_reference(
        &self,
        dependent: &EntityRef,
        target: &EntityRef,
    ) -> Result<(), StoreError>;

    /// Writes a snapshotted record back, replacing any current version
    async fn restore(&self, snapshot: &RecordSnapshot) -> Result<(), StoreError>;
}

/// Audit trail of executed deletions
#[async_trait]
pub trait DeletionAuditRepository: Send + Sync {
    async fn record(&self, entry: &DeletionAuditEntry) -> Result<()>;

    /// Most recent entries first
    async fn recent(&self, limit: usize) -> Result<Vec<DeletionAuditEntry>>;

    async fn count(&self) -> Result<usize>;
}
