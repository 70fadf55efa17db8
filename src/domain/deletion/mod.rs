// Record identity and stored shape
pub mod entity;

// Static dependency registry
pub mod catalog;

// Edges and per-target impacts
pub mod impact;

// Strategies and per-request options
pub mod strategy;

// Execution outcome, backups and audit rows
pub mod result;

pub use catalog::{EntityCatalog, Relation};
pub use entity::{DeletableItem, EntityRecord, EntityRef, EntityType, RecordStatus};
pub use impact::{DeletionImpact, DependencyEdge, ImpactReport};
pub use result::{
    DeletionAuditEntry, DeletionBackup, DeletionResult, DeletionStatistics, ExecutionState,
    OrphanedReference, RecordSnapshot,
};
pub use strategy::{DeletionConfig, DeletionStrategy, LogLevel, RecommendationPolicy};
