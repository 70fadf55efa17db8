use crate::domain::deletion::entity::{EntityRef, EntityType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by an [`EntityStore`](crate::domain::repositories::EntityStore)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record {entity}: {reason}")]
    Corrupt { entity: String, reason: String },

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Errors surfaced to callers of the deletion subsystem.
///
/// Every variant names the record it concerns so a refused or failed request
/// always explains itself. These values are also embedded in
/// [`DeletionResult`](crate::domain::deletion::result::DeletionResult), hence
/// the serde derives.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeletionError {
    #[error("Invalid deletion target '{id}': {reason}")]
    Validation { id: String, reason: String },

    #[error(
        "Deletion of {entity_type}#{id} blocked: {critical_count} critical of {dependent_count} dependencies, {affected_records} affected records ({details})"
    )]
    DependencyConflict {
        entity_type: EntityType,
        id: String,
        critical_count: usize,
        dependent_count: usize,
        affected_records: usize,
        details: String,
    },

    #[error("Store unavailable while processing {entity_type}#{id}: {reason}")]
    StoreUnavailable {
        entity_type: EntityType,
        id: String,
        reason: String,
    },

    #[error("Deletion partially failed: {failed} of {attempted} operations failed")]
    PartialFailure { failed: usize, attempted: usize },

    #[error("Confirmation required before deleting {entity_type}#{id}: {reason}")]
    ConfirmationRequired {
        entity_type: EntityType,
        id: String,
        reason: String,
    },

    #[error("Strategy {strategy} rejected for {entity_type}#{id}: {reason}")]
    StrategyRejected {
        strategy: String,
        entity_type: EntityType,
        id: String,
        reason: String,
    },

    #[error("Store error on {entity_type}#{id}: {reason}")]
    Store {
        entity_type: EntityType,
        id: String,
        reason: String,
    },

    #[error("Skipped {entity_type}#{id}: {reason}")]
    Skipped {
        entity_type: EntityType,
        id: String,
        reason: String,
    },

    #[error("Backup failed for {entity_type}#{id}: {reason}")]
    Backup {
        entity_type: EntityType,
        id: String,
        reason: String,
    },
}

impl DeletionError {
    pub fn validation(id: impl Into<String>, reason: impl Into<String>) -> Self {
        DeletionError::Validation {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Classifies a store failure on `entity` into the caller-facing taxonomy
    pub fn from_store(entity: &EntityRef, err: &StoreError) -> Self {
        if err.is_unavailable() {
            DeletionError::StoreUnavailable {
                entity_type: entity.entity_type,
                id: entity.id.clone(),
                reason: err.to_string(),
            }
        } else {
            DeletionError::Store {
                entity_type: entity.entity_type,
                id: entity.id.clone(),
                reason: err.to_string(),
            }
        }
    }

    /// The record this error concerns, when it concerns exactly one
    pub fn entity(&self) -> Option<EntityRef> {
        match self {
            DeletionError::Validation { .. } | DeletionError::PartialFailure { .. } => None,
            DeletionError::DependencyConflict {
                entity_type, id, ..
            }
            | DeletionError::StoreUnavailable {
                entity_type, id, ..
            }
            | DeletionError::ConfirmationRequired {
                entity_type, id, ..
            }
            | DeletionError::StrategyRejected {
                entity_type, id, ..
            }
            | DeletionError::Store {
                entity_type, id, ..
            }
            | DeletionError::Skipped {
                entity_type, id, ..
            }
            | DeletionError::Backup {
                entity_type, id, ..
            } => Some(EntityRef::new(*entity_type, id.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_conflict_formatting() {
        let error = DeletionError::DependencyConflict {
            entity_type: EntityType::ActiveTrade,
            id: "1".to_string(),
            critical_count: 1,
            dependent_count: 2,
            affected_records: 2,
            details: "chart_analysis#50".to_string(),
        };

        let msg = error.to_string();
        assert!(msg.contains("active_trade#1"));
        assert!(msg.contains("1 critical"));
        assert!(msg.contains("2 affected records"));
        assert!(msg.contains("chart_analysis#50"));
    }

    #[test]
    fn test_store_error_classification() {
        let entity = EntityRef::new(EntityType::Alert, "7");

        let unavailable =
            DeletionError::from_store(&entity, &StoreError::Unavailable("timeout".into()));
        assert!(matches!(unavailable, DeletionError::StoreUnavailable { .. }));

        let backend = DeletionError::from_store(&entity, &StoreError::Backend("locked".into()));
        assert!(matches!(backend, DeletionError::Store { .. }));
        assert_eq!(backend.entity(), Some(entity));
    }

    #[test]
    fn test_errors_serialize_with_kind_tag() {
        let error = DeletionError::validation("", "id is empty");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["reason"], "id is empty");
    }
}
