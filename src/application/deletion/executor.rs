//! Deletion Executor
//!
//! Runs one execute request through
//! `Requested -> Validating -> {Blocked | Ready} -> Executing -> {Completed | PartiallyFailed | Failed}`.
//!
//! Validation is repeated under the entity type locks so the plan reflects the
//! store as it is right before the first write. Writes happen on a spawned
//! task that owns the locks; dropping the caller's future after that point
//! does not interrupt them.

use super::assessor::{Assessment, ImpactAssessor};
use super::locks::EntityTypeLocks;
use super::plan::DeletionPlan;
use super::strategy_engine::{StrategyEngine, StrategyVerdict};
use super::validate_targets;
use crate::domain::deletion::{
    DeletableItem, DeletionBackup, DeletionConfig, DeletionImpact, DeletionResult, EntityCatalog,
    EntityRef, EntityType, ExecutionState, LogLevel, OrphanedReference,
};
use crate::domain::errors::DeletionError;
use crate::domain::repositories::EntityStore;
use chrono::Utc;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct DeletionExecutor {
    store: Arc<dyn EntityStore>,
    assessor: ImpactAssessor,
    engine: StrategyEngine,
    locks: EntityTypeLocks,
}

impl DeletionExecutor {
    pub fn new(store: Arc<dyn EntityStore>, engine: StrategyEngine) -> Self {
        Self {
            assessor: ImpactAssessor::new(store.clone()),
            store,
            engine,
            locks: EntityTypeLocks::new(),
        }
    }

    /// Share a lock table with other executors over the same store
    pub fn with_locks(mut self, locks: EntityTypeLocks) -> Self {
        self.locks = locks;
        self
    }

    pub async fn execute(
        &self,
        items: &[DeletableItem],
        config: &DeletionConfig,
    ) -> Result<DeletionResult, DeletionError> {
        let targets = validate_targets(items)?;
        let mut result = DeletionResult::new(Uuid::new_v4(), config.strategy, config.dry_run);
        let progress = Progress::new(result.operation_id, config.log_level);

        info!(
            "[{}] Deletion requested: {} targets, strategy {}, force {}, dry run {}",
            result.operation_id,
            targets.len(),
            config.strategy,
            config.force,
            config.dry_run
        );

        advance(&mut result, ExecutionState::Validating);

        let lock_types = EntityCatalog::reachable_types(targets.iter().map(|t| t.entity_type));
        let guard = self.locks.acquire(&lock_types).await;

        let mut assessments: Vec<Assessment> = Vec::new();
        for outcome in self.assessor.assess_with_graphs(&targets).await {
            match outcome {
                Ok(assessment) => assessments.push(assessment),
                Err(e) => {
                    progress.failure(&e);
                    result.errors.push(e);
                }
            }
        }

        if assessments.is_empty() {
            advance(&mut result, ExecutionState::Failed);
            return Ok(finish(result));
        }

        let impacts: Vec<DeletionImpact> = assessments.iter().map(|a| a.impact.clone()).collect();
        match self.engine.validate(config.strategy, &impacts, config.force) {
            StrategyVerdict::Approved => {}
            StrategyVerdict::RequiresConfirmation { reason } if config.override_confirmed() => {
                warn!(
                    "[{}] Forced override confirmed: {}",
                    result.operation_id, reason
                );
                result
                    .warnings
                    .push(format!("Forced override confirmed: {}", reason));
            }
            StrategyVerdict::RequiresConfirmation { reason } => {
                result.errors.extend(
                    impacts
                        .iter()
                        .filter(|i| i.has_critical())
                        .map(|i| DeletionError::ConfirmationRequired {
                            entity_type: i.target_type,
                            id: i.target_id.clone(),
                            reason: format!("{}: {}", reason, i.critical_summary()),
                        }),
                );
                advance(&mut result, ExecutionState::Blocked);
                return Ok(finish(result));
            }
            StrategyVerdict::Rejected(errors) => {
                result.errors.extend(errors);
                advance(&mut result, ExecutionState::Blocked);
                return Ok(finish(result));
            }
        }

        advance(&mut result, ExecutionState::Ready);

        let plan = DeletionPlan::build(
            config.strategy,
            &assessments,
            config.preserve_production_data,
        );
        result.preserved_items = plan.preserved_items();
        result.warnings.extend(plan.warnings.iter().cloned());
        for preserved in &plan.preserved {
            progress.warning(&format!("Preserving {}", preserved));
        }

        if config.dry_run {
            result.deleted_items = plan.deletion_items();
            result.orphaned_references = plan.detachments.clone();
            info!(
                "[{}] Dry run: would delete {}, preserve {}, detach {}",
                result.operation_id,
                plan.deletions.len(),
                plan.preserved.len(),
                plan.detachments.len()
            );
            advance(&mut result, ExecutionState::Completed);
            return Ok(finish(result));
        }

        let backup = if config.create_backup || config.atomic {
            match self.take_backup(result.operation_id, &plan).await {
                Ok(backup) => Some(backup),
                Err(e) => {
                    progress.failure(&e);
                    result.errors.push(e);
                    advance(&mut result, ExecutionState::Failed);
                    return Ok(finish(result));
                }
            }
        } else {
            None
        };
        result.backup = backup.clone();

        advance(&mut result, ExecutionState::Executing);

        let attempted = plan.deletions.len() + plan.detachments.len();
        let writer = PlanWriter {
            store: self.store.clone(),
            plan: plan.clone(),
            backup,
            atomic: config.atomic,
            progress,
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            writer.run().await
        });

        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("[{}] Write task aborted: {}", result.operation_id, e);
                result.errors.push(DeletionError::PartialFailure {
                    failed: attempted,
                    attempted,
                });
                advance(&mut result, ExecutionState::Failed);
                return Ok(finish(result));
            }
        };

        result.errors.extend(outcome.errors);
        result.warnings.extend(outcome.warnings);

        if outcome.rolled_back {
            advance(&mut result, ExecutionState::Failed);
            return Ok(finish(result));
        }

        result.deleted_items = outcome.deleted.iter().map(|e| plan.item(e)).collect();
        result.orphaned_references = outcome.detached;

        let next = if result.errors.is_empty() {
            ExecutionState::Completed
        } else if result.deleted_items.is_empty() && result.orphaned_references.is_empty() {
            ExecutionState::Failed
        } else {
            result.errors.push(DeletionError::PartialFailure {
                failed: result.errors.len(),
                attempted,
            });
            ExecutionState::PartiallyFailed
        };
        advance(&mut result, next);

        Ok(finish(result))
    }

    /// Snapshots every record the plan will write to
    async fn take_backup(
        &self,
        operation_id: Uuid,
        plan: &DeletionPlan,
    ) -> Result<DeletionBackup, DeletionError> {
        let mut backup = DeletionBackup::new(operation_id);
        for entity in plan.touched_records() {
            let snapshot = self
                .store
                .snapshot(&entity)
                .await
                .map_err(|e| DeletionError::Backup {
                    entity_type: entity.entity_type,
                    id: entity.id.clone(),
                    reason: e.to_string(),
                })?;
            match snapshot {
                Some(snapshot) => backup.snapshots.push(snapshot),
                None => debug!("[{}] {} already gone, nothing to back up", operation_id, entity),
            }
        }
        info!(
            "[{}] Backup taken: {} snapshots",
            operation_id,
            backup.snapshots.len()
        );
        Ok(backup)
    }

    /// Writes every snapshot of `backup` back to the store. All checksums are
    /// verified before the first write.
    pub async fn restore(&self, backup: &DeletionBackup) -> Result<usize, DeletionError> {
        for snapshot in &backup.snapshots {
            snapshot.to_record().map_err(|e| DeletionError::Backup {
                entity_type: snapshot.entity.entity_type,
                id: snapshot.entity.id.clone(),
                reason: e.to_string(),
            })?;
        }

        let types: BTreeSet<EntityType> =
            backup.snapshots.iter().map(|s| s.entity.entity_type).collect();
        let _guard = self.locks.acquire(&types).await;

        for snapshot in &backup.snapshots {
            self.store.restore(snapshot).await.map_err(|e| {
                DeletionError::from_store(&snapshot.entity, &e)
            })?;
        }

        info!(
            "[{}] Restored {} records from backup",
            backup.operation_id,
            backup.snapshots.len()
        );
        Ok(backup.snapshots.len())
    }
}

fn advance(result: &mut DeletionResult, next: ExecutionState) {
    let current = result.final_state;
    if current.can_transition_to(next) {
        info!("[{}] {} -> {}", result.operation_id, current, next);
    } else {
        error!(
            "[{}] Unexpected transition {} -> {}",
            result.operation_id, current, next
        );
    }
    result.final_state = next;
}

fn finish(mut result: DeletionResult) -> DeletionResult {
    result.success = result.errors.is_empty();
    result.completed_at = Utc::now();
    info!(
        "[{}] Finished in state {}: {} deleted, {} preserved, {} errors",
        result.operation_id,
        result.final_state,
        result.deleted_items.len(),
        result.preserved_items.len(),
        result.errors.len()
    );
    result
}

/// Per-item progress events, filtered by the request's log level
#[derive(Debug, Clone, Copy)]
struct Progress {
    operation_id: Uuid,
    level: LogLevel,
}

impl Progress {
    fn new(operation_id: Uuid, level: LogLevel) -> Self {
        Self {
            operation_id,
            level,
        }
    }

    fn item(&self, message: &str) {
        match self.level {
            LogLevel::Debug => debug!("[{}] {}", self.operation_id, message),
            LogLevel::Info => info!("[{}] {}", self.operation_id, message),
            LogLevel::Warn | LogLevel::Error => {}
        }
    }

    fn warning(&self, message: &str) {
        if self.level >= LogLevel::Warn {
            warn!("[{}] {}", self.operation_id, message);
        }
    }

    fn failure(&self, err: &DeletionError) {
        error!("[{}] {}", self.operation_id, err);
    }
}

#[derive(Debug, Default)]
struct WriteOutcome {
    deleted: Vec<EntityRef>,
    detached: Vec<OrphanedReference>,
    errors: Vec<DeletionError>,
    warnings: Vec<String>,
    rolled_back: bool,
}

enum Write {
    Detached(EntityRef),
    Deleted(EntityRef),
}

struct PlanWriter {
    store: Arc<dyn EntityStore>,
    plan: DeletionPlan,
    backup: Option<DeletionBackup>,
    atomic: bool,
    progress: Progress,
}

impl PlanWriter {
    async fn run(self) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();
        let mut written: Vec<Write> = Vec::new();
        // Records that must not be deleted because a write below them failed
        let mut failed: HashSet<EntityRef> = HashSet::new();

        for detachment in &self.plan.detachments {
            match self
                .store
                .detach_reference(&detachment.dependent, &detachment.removed_target)
                .await
            {
                Ok(()) => {
                    self.progress.item(&format!(
                        "Detached {} from {}",
                        detachment.dependent, detachment.removed_target
                    ));
                    written.push(Write::Detached(detachment.dependent.clone()));
                    outcome.detached.push(detachment.clone());
                }
                Err(e) => {
                    let err = DeletionError::from_store(&detachment.dependent, &e);
                    self.progress.failure(&err);
                    outcome.errors.push(err);
                    failed.insert(detachment.removed_target.clone());
                    if self.atomic {
                        self.rollback(&written, &mut outcome).await;
                        return outcome;
                    }
                }
            }
        }

        for entity in &self.plan.deletions {
            if failed.contains(entity) {
                let err = DeletionError::Skipped {
                    entity_type: entity.entity_type,
                    id: entity.id.clone(),
                    reason: "a reference to it could not be detached".to_string(),
                };
                self.progress.failure(&err);
                outcome.errors.push(err);
                continue;
            }

            if let Some(dependent) = self
                .plan
                .dependents_of(entity)
                .iter()
                .find(|d| failed.contains(*d))
            {
                let err = DeletionError::Skipped {
                    entity_type: entity.entity_type,
                    id: entity.id.clone(),
                    reason: format!("dependent {} was not deleted", dependent),
                };
                self.progress.failure(&err);
                outcome.errors.push(err);
                failed.insert(entity.clone());
                continue;
            }

            match self.store.delete(entity).await {
                Ok(removed) => {
                    if removed {
                        self.progress.item(&format!("Deleted {}", entity));
                        written.push(Write::Deleted(entity.clone()));
                    } else {
                        self.progress
                            .item(&format!("{} was already gone", entity));
                    }
                    outcome.deleted.push(entity.clone());
                }
                Err(e) => {
                    let err = DeletionError::from_store(entity, &e);
                    self.progress.failure(&err);
                    outcome.errors.push(err);
                    failed.insert(entity.clone());
                    if self.atomic {
                        self.rollback(&written, &mut outcome).await;
                        return outcome;
                    }
                }
            }
        }

        outcome
    }

    /// Undo `written`, newest first, from the backup
    async fn rollback(&self, written: &[Write], outcome: &mut WriteOutcome) {
        let Some(backup) = &self.backup else {
            return;
        };

        let mut restored = 0usize;
        for write in written.iter().rev() {
            let entity = match write {
                Write::Detached(entity) | Write::Deleted(entity) => entity,
            };
            let Some(snapshot) = backup.snapshot_for(entity) else {
                continue;
            };
            match self.store.restore(snapshot).await {
                Ok(()) => restored += 1,
                Err(e) => {
                    let err = DeletionError::Backup {
                        entity_type: entity.entity_type,
                        id: entity.id.clone(),
                        reason: format!("rollback failed: {}", e),
                    };
                    self.progress.failure(&err);
                    outcome.errors.push(err);
                }
            }
        }

        warn!(
            "[{}] Atomic deletion rolled back {} writes",
            self.progress.operation_id, restored
        );
        outcome
            .warnings
            .push(format!("Rolled back {} writes after the first failure", restored));
        outcome.deleted.clear();
        outcome.detached.clear();
        outcome.rolled_back = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deletion::{DeletionStrategy, EntityRecord};
    use crate::infrastructure::mock::{MockEntityStore, StoreWrite};
    use crate::infrastructure::repositories::InMemoryEntityStore;

    fn r(entity_type: EntityType, id: &str) -> EntityRef {
        EntityRef::new(entity_type, id)
    }

    fn trade_scenario() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new(EntityType::ActiveTrade, "1"),
            EntityRecord::new(EntityType::ChartAnalysis, "50")
                .referencing(EntityType::ActiveTrade, "1"),
            EntityRecord::new(EntityType::Alert, "7").referencing(EntityType::ActiveTrade, "1"),
        ]
    }

    fn cascade() -> DeletionConfig {
        DeletionConfig::with_strategy(DeletionStrategy::Cascade)
    }

    #[tokio::test]
    async fn test_blocked_by_critical_dependency() {
        let store = MockEntityStore::with_records(trade_scenario());
        let executor = DeletionExecutor::new(Arc::new(store.clone()), StrategyEngine::default());

        let result = executor
            .execute(&[DeletableItem::new(EntityType::ActiveTrade, "1")], &cascade())
            .await
            .unwrap();

        assert_eq!(result.final_state, ExecutionState::Blocked);
        assert!(!result.success);
        assert!(result.deleted_items.is_empty());
        assert!(matches!(
            result.errors[0],
            DeletionError::DependencyConflict { .. }
        ));
        assert!(store.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_forced_without_confirmation_is_blocked() {
        let store = MockEntityStore::with_records(trade_scenario());
        let executor = DeletionExecutor::new(Arc::new(store.clone()), StrategyEngine::default());
        let mut config = cascade();
        config.force = true;

        let result = executor
            .execute(&[DeletableItem::new(EntityType::ActiveTrade, "1")], &config)
            .await
            .unwrap();

        assert!(result.is_blocked());
        assert!(matches!(
            result.errors[0],
            DeletionError::ConfirmationRequired { .. }
        ));
        assert!(store.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_forced_confirmed_cascade_order() {
        let store = MockEntityStore::with_records(trade_scenario());
        let executor = DeletionExecutor::new(Arc::new(store.clone()), StrategyEngine::default());
        let mut config = cascade();
        config.force = true;
        config.confirmed = true;

        let result = executor
            .execute(&[DeletableItem::new(EntityType::ActiveTrade, "1")], &config)
            .await
            .unwrap();

        assert!(result.success, "errors: {:?}", result.errors);
        assert_eq!(result.final_state, ExecutionState::Completed);
        let expected = vec![
            r(EntityType::Alert, "7"),
            r(EntityType::ChartAnalysis, "50"),
            r(EntityType::ActiveTrade, "1"),
        ];
        assert_eq!(result.deleted_refs(), expected);
        assert_eq!(store.deletions().await, expected);
        assert_eq!(result.backup.as_ref().map(|b| b.snapshots.len()), Some(3));
        assert!(store.inner().is_empty().await);
    }

    #[tokio::test]
    async fn test_dry_run_matches_live_partition() {
        let records = vec![
            EntityRecord::new(EntityType::LiquidityPosition, "lp-1"),
            EntityRecord::new(EntityType::PriceHistory, "p-1")
                .referencing(EntityType::LiquidityPosition, "lp-1"),
            EntityRecord::new(EntityType::FeeHistory, "f-1")
                .referencing(EntityType::LiquidityPosition, "lp-1")
                .production(),
        ];
        let store = MockEntityStore::with_records(records);
        let executor = DeletionExecutor::new(Arc::new(store.clone()), StrategyEngine::default());
        let targets = [DeletableItem::new(EntityType::LiquidityPosition, "lp-1")];

        let mut config = cascade();
        config.dry_run = true;
        let dry = executor.execute(&targets, &config).await.unwrap();
        assert!(dry.success);
        assert!(dry.dry_run);
        assert!(dry.backup.is_none());
        assert!(store.writes().await.is_empty());
        assert_eq!(store.inner().len().await, 3);

        config.dry_run = false;
        let live = executor.execute(&targets, &config).await.unwrap();
        assert_eq!(dry.deleted_items, live.deleted_items);
        assert_eq!(dry.preserved_items, live.preserved_items);
        assert_eq!(dry.orphaned_references, live.orphaned_references);
        assert_eq!(live.preserved_refs(), vec![r(EntityType::FeeHistory, "f-1")]);
    }

    #[tokio::test]
    async fn test_failed_dependent_skips_its_dependee() {
        let store = MockEntityStore::with_records(trade_scenario());
        store.fail_delete(r(EntityType::ChartAnalysis, "50")).await;
        let executor = DeletionExecutor::new(Arc::new(store.clone()), StrategyEngine::default());
        let mut config = cascade();
        config.force = true;
        config.confirm_before_delete = false;

        let result = executor
            .execute(&[DeletableItem::new(EntityType::ActiveTrade, "1")], &config)
            .await
            .unwrap();

        assert_eq!(result.final_state, ExecutionState::PartiallyFailed);
        assert_eq!(result.deleted_refs(), vec![r(EntityType::Alert, "7")]);
        assert!(result.errors.iter().any(|e| matches!(
            e,
            DeletionError::Skipped { id, .. } if id == "1"
        )));
        assert!(
            result
                .errors
                .iter()
                .any(|e| matches!(e, DeletionError::PartialFailure { .. }))
        );
        assert_eq!(store.deletions().await, vec![r(EntityType::Alert, "7")]);
    }

    #[tokio::test]
    async fn test_atomic_rolls_back_on_first_failure() {
        let store = MockEntityStore::with_records(trade_scenario());
        store.fail_delete(r(EntityType::ActiveTrade, "1")).await;
        let executor = DeletionExecutor::new(Arc::new(store.clone()), StrategyEngine::default());
        let mut config = cascade();
        config.force = true;
        config.confirmed = true;
        config.atomic = true;
        config.create_backup = false;

        let result = executor
            .execute(&[DeletableItem::new(EntityType::ActiveTrade, "1")], &config)
            .await
            .unwrap();

        assert_eq!(result.final_state, ExecutionState::Failed);
        assert!(result.deleted_items.is_empty());
        assert!(result.backup.is_some());
        assert_eq!(store.inner().len().await, 3);

        let restores: Vec<_> = store
            .writes()
            .await
            .into_iter()
            .filter_map(|w| match w {
                StoreWrite::Restore(entity) => Some(entity),
                _ => None,
            })
            .collect();
        assert_eq!(
            restores,
            vec![r(EntityType::ChartAnalysis, "50"), r(EntityType::Alert, "7")]
        );
    }

    #[tokio::test]
    async fn test_backup_failure_prevents_writes() {
        let store = MockEntityStore::with_records([EntityRecord::new(EntityType::Alert, "7")]);
        let executor = DeletionExecutor::new(Arc::new(store.clone()), StrategyEngine::default());

        // Assessment reads a healthy store, snapshots hit an offline one
        let offline = MockEntityStore::new(store.inner().clone());
        offline.set_unavailable(true);
        let plan_store: Arc<dyn EntityStore> = Arc::new(offline);
        let failing = DeletionExecutor {
            store: plan_store,
            assessor: ImpactAssessor::new(Arc::new(store.clone())),
            engine: StrategyEngine::default(),
            locks: EntityTypeLocks::new(),
        };

        let result = failing
            .execute(&[DeletableItem::new(EntityType::Alert, "7")], &cascade())
            .await
            .unwrap();

        assert_eq!(result.final_state, ExecutionState::Failed);
        assert!(matches!(result.errors[0], DeletionError::Backup { .. }));
        assert_eq!(store.inner().len().await, 1);

        // The healthy executor still works
        let ok = executor
            .execute(&[DeletableItem::new(EntityType::Alert, "7")], &cascade())
            .await
            .unwrap();
        assert!(ok.success);
    }

    #[tokio::test]
    async fn test_missing_record_counts_as_deleted() {
        let executor = DeletionExecutor::new(
            Arc::new(InMemoryEntityStore::new()),
            StrategyEngine::default(),
        );

        let result = executor
            .execute(&[DeletableItem::new(EntityType::Alert, "404")], &cascade())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.deleted_refs(), vec![r(EntityType::Alert, "404")]);
    }

    #[tokio::test]
    async fn test_restore_returns_records() {
        let store = Arc::new(InMemoryEntityStore::with_records(trade_scenario()));
        let executor = DeletionExecutor::new(store.clone(), StrategyEngine::default());
        let mut config = cascade();
        config.force = true;
        config.confirmed = true;

        let result = executor
            .execute(&[DeletableItem::new(EntityType::ActiveTrade, "1")], &config)
            .await
            .unwrap();
        assert!(store.is_empty().await);

        let restored = executor.restore(result.backup.as_ref().unwrap()).await.unwrap();
        assert_eq!(restored, 3);
        assert_eq!(store.len().await, 3);
        let alert = store.get(&r(EntityType::Alert, "7")).await.unwrap().unwrap();
        assert!(alert.references_entity(&r(EntityType::ActiveTrade, "1")));
    }

    #[tokio::test]
    async fn test_empty_request_is_validation_error() {
        let executor = DeletionExecutor::new(
            Arc::new(InMemoryEntityStore::new()),
            StrategyEngine::default(),
        );
        let err = executor.execute(&[], &cascade()).await.unwrap_err();
        assert!(matches!(err, DeletionError::Validation { .. }));
    }
}
