use super::entity::{DeletableItem, EntityRecord, EntityRef, EntityType};
use super::strategy::DeletionStrategy;
use crate::domain::errors::{DeletionError, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Lifecycle of one execute request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Requested,
    Validating,
    Blocked,
    Ready,
    Executing,
    Completed,
    PartiallyFailed,
    Failed,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Blocked
                | ExecutionState::Completed
                | ExecutionState::PartiallyFailed
                | ExecutionState::Failed
        )
    }

    /// Legal edges of the state machine
    pub fn can_transition_to(&self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Requested, Validating)
                | (Requested, Blocked)
                | (Validating, Blocked)
                | (Validating, Ready)
                | (Validating, Failed)
                | (Ready, Executing)
                | (Ready, Completed)
                | (Ready, Failed)
                | (Executing, Completed)
                | (Executing, PartiallyFailed)
                | (Executing, Failed)
        )
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecutionState::Requested => "requested",
            ExecutionState::Validating => "validating",
            ExecutionState::Blocked => "blocked",
            ExecutionState::Ready => "ready",
            ExecutionState::Executing => "executing",
            ExecutionState::Completed => "completed",
            ExecutionState::PartiallyFailed => "partially_failed",
            ExecutionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Point-in-time copy of one record, taken before a destructive write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSnapshot {
    pub entity: EntityRef,
    pub taken_at: DateTime<Utc>,
    pub data: String,
    /// SHA-256 of `data`, hex encoded
    pub checksum: String,
}

fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

impl RecordSnapshot {
    pub fn capture(record: &EntityRecord) -> Result<Self, StoreError> {
        let data = serde_json::to_string(record).map_err(|e| StoreError::Corrupt {
            entity: record.key().to_string(),
            reason: e.to_string(),
        })?;
        let checksum = sha256_hex(&data);
        Ok(Self {
            entity: record.key(),
            taken_at: Utc::now(),
            data,
            checksum,
        })
    }

    /// Decodes the snapshot, refusing data that no longer matches its checksum
    pub fn to_record(&self) -> Result<EntityRecord, StoreError> {
        if sha256_hex(&self.data) != self.checksum {
            return Err(StoreError::Corrupt {
                entity: self.entity.to_string(),
                reason: "snapshot checksum mismatch".to_string(),
            });
        }
        serde_json::from_str(&self.data).map_err(|e| StoreError::Corrupt {
            entity: self.entity.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Backup owned by one execute request and handed back in its result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionBackup {
    pub operation_id: Uuid,
    pub taken_at: DateTime<Utc>,
    pub snapshots: Vec<RecordSnapshot>,
}

impl DeletionBackup {
    pub fn new(operation_id: Uuid) -> Self {
        Self {
            operation_id,
            taken_at: Utc::now(),
            snapshots: Vec::new(),
        }
    }

    pub fn snapshot_for(&self, entity: &EntityRef) -> Option<&RecordSnapshot> {
        self.snapshots.iter().find(|s| &s.entity == entity)
    }
}

/// A reference that was nulled because its target was deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedReference {
    pub dependent: EntityRef,
    pub removed_target: EntityRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionResult {
    pub operation_id: Uuid,
    pub success: bool,
    pub strategy: DeletionStrategy,
    pub dry_run: bool,
    pub final_state: ExecutionState,
    pub deleted_items: Vec<DeletableItem>,
    pub preserved_items: Vec<DeletableItem>,
    pub orphaned_references: Vec<OrphanedReference>,
    pub warnings: Vec<String>,
    pub errors: Vec<DeletionError>,
    pub backup: Option<DeletionBackup>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl DeletionResult {
    pub fn new(operation_id: Uuid, strategy: DeletionStrategy, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            operation_id,
            success: false,
            strategy,
            dry_run,
            final_state: ExecutionState::Requested,
            deleted_items: Vec::new(),
            preserved_items: Vec::new(),
            orphaned_references: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            backup: None,
            started_at: now,
            completed_at: now,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.final_state == ExecutionState::Blocked
    }

    pub fn deleted_refs(&self) -> Vec<EntityRef> {
        self.deleted_items.iter().map(|i| i.key()).collect()
    }

    pub fn preserved_refs(&self) -> Vec<EntityRef> {
        self.preserved_items.iter().map(|i| i.key()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionStatistics {
    pub total_items: BTreeMap<EntityType, usize>,
    pub deletable_items: BTreeMap<EntityType, usize>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Audit log row: the persisted form of a [`DeletionResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionAuditEntry {
    pub operation_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub strategy: DeletionStrategy,
    pub dry_run: bool,
    pub success: bool,
    pub final_state: ExecutionState,
    pub deleted_count: usize,
    pub preserved_count: usize,
    pub error_count: usize,
    pub result: DeletionResult,
}

impl From<&DeletionResult> for DeletionAuditEntry {
    fn from(result: &DeletionResult) -> Self {
        Self {
            operation_id: result.operation_id,
            recorded_at: Utc::now(),
            strategy: result.strategy,
            dry_run: result.dry_run,
            success: result.success,
            final_state: result.final_state,
            deleted_count: result.deleted_items.len(),
            preserved_count: result.preserved_items.len(),
            error_count: result.errors.len(),
            result: result.clone(),
        }
    }
}
