use super::assessor::ImpactAssessor;
use super::executor::DeletionExecutor;
use super::locks::EntityTypeLocks;
use super::statistics::{DEFAULT_ARCHIVE_AFTER_DAYS, StatisticsAggregator};
use super::strategy_engine::StrategyEngine;
use super::validate_targets;
use crate::domain::deletion::{
    DeletableItem, DeletionAuditEntry, DeletionBackup, DeletionConfig, DeletionResult,
    DeletionStatistics, DeletionStrategy, ImpactReport, RecommendationPolicy,
};
use crate::domain::errors::DeletionError;
use crate::domain::repositories::{DeletionAuditRepository, EntityStore};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Entry point of the deletion subsystem: assess, execute, report
pub struct DeletionService {
    assessor: ImpactAssessor,
    engine: StrategyEngine,
    executor: DeletionExecutor,
    statistics: StatisticsAggregator,
    audit: Option<Arc<dyn DeletionAuditRepository>>,
}

impl DeletionService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self::with_policy(store, RecommendationPolicy::default(), DEFAULT_ARCHIVE_AFTER_DAYS)
    }

    pub fn with_policy(
        store: Arc<dyn EntityStore>,
        policy: RecommendationPolicy,
        archive_after_days: i64,
    ) -> Self {
        let engine = StrategyEngine::new(policy);
        Self {
            assessor: ImpactAssessor::new(store.clone()),
            engine,
            executor: DeletionExecutor::new(store.clone(), engine),
            statistics: StatisticsAggregator::new(store).with_archive_after_days(archive_after_days),
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn DeletionAuditRepository>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_locks(mut self, locks: EntityTypeLocks) -> Self {
        self.executor = self.executor.with_locks(locks);
        self
    }

    /// Read-only impact of deleting `items`, with a recommended strategy
    pub async fn assess_bulk_deletion_impact(
        &self,
        items: &[DeletableItem],
    ) -> Result<ImpactReport, DeletionError> {
        let targets = validate_targets(items)?;
        let (impacts, failures) = self.assessor.assess(&targets).await;
        Ok(self.assessor.summarize(&self.engine, impacts, failures))
    }

    pub async fn recommend_strategy(
        &self,
        items: &[DeletableItem],
    ) -> Result<DeletionStrategy, DeletionError> {
        Ok(self
            .assess_bulk_deletion_impact(items)
            .await?
            .recommended_strategy)
    }

    pub async fn execute_deletion(
        &self,
        items: &[DeletableItem],
        config: &DeletionConfig,
    ) -> Result<DeletionResult, DeletionError> {
        let result = self.executor.execute(items, config).await?;

        if !result.dry_run
            && let Some(audit) = &self.audit
            && let Err(e) = audit.record(&DeletionAuditEntry::from(&result)).await
        {
            // Writes are already committed at this point
            warn!(
                "Failed to record audit entry for {}: {:#}",
                result.operation_id, e
            );
        }

        Ok(result)
    }

    pub async fn get_deletion_statistics(&self) -> Result<DeletionStatistics, DeletionError> {
        self.statistics.stats().await
    }

    pub async fn restore_backup(&self, backup: &DeletionBackup) -> Result<usize, DeletionError> {
        info!(
            "Restoring backup of operation {} ({} snapshots)",
            backup.operation_id,
            backup.snapshots.len()
        );
        self.executor.restore(backup).await
    }

    /// Most recent executions first; empty when no audit log is configured
    pub async fn deletion_history(&self, limit: usize) -> Result<Vec<DeletionAuditEntry>> {
        match &self.audit {
            Some(audit) => audit.recent(limit).await,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deletion::{EntityRecord, EntityType, ExecutionState};
    use crate::infrastructure::repositories::{
        InMemoryDeletionAuditRepository, InMemoryEntityStore,
    };

    fn service() -> (DeletionService, Arc<InMemoryDeletionAuditRepository>) {
        let store = Arc::new(InMemoryEntityStore::with_records([
            EntityRecord::new(EntityType::ActiveTrade, "1"),
            EntityRecord::new(EntityType::ChartAnalysis, "50")
                .referencing(EntityType::ActiveTrade, "1"),
            EntityRecord::new(EntityType::Alert, "7").referencing(EntityType::ActiveTrade, "1"),
        ]));
        let audit = Arc::new(InMemoryDeletionAuditRepository::new());
        (DeletionService::new(store).with_audit(audit.clone()), audit)
    }

    #[tokio::test]
    async fn test_assess_recommends_stop_for_critical() {
        let (service, _) = service();

        let report = service
            .assess_bulk_deletion_impact(&[DeletableItem::new(EntityType::ActiveTrade, "1")])
            .await
            .unwrap();

        assert_eq!(report.recommended_strategy, DeletionStrategy::WarnAndStop);
        assert!(report.has_critical());
        assert_eq!(report.total_affected_records, 2);
    }

    #[tokio::test]
    async fn test_blank_id_rejected_before_walk() {
        let (service, _) = service();
        let err = service
            .assess_bulk_deletion_impact(&[DeletableItem::new(EntityType::Alert, "  ")])
            .await
            .unwrap_err();
        assert!(matches!(err, DeletionError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_executions_are_audited_except_dry_runs() {
        let (service, audit) = service();
        let items = [DeletableItem::new(EntityType::Alert, "7")];
        let mut config = DeletionConfig::with_strategy(DeletionStrategy::Cascade);

        config.dry_run = true;
        service.execute_deletion(&items, &config).await.unwrap();
        assert_eq!(audit.count().await.unwrap(), 0);

        config.dry_run = false;
        let result = service.execute_deletion(&items, &config).await.unwrap();
        assert_eq!(result.final_state, ExecutionState::Completed);

        let history = service.deletion_history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].operation_id, result.operation_id);
        assert_eq!(history[0].deleted_count, 1);
    }

    #[tokio::test]
    async fn test_restore_backup_roundtrip() {
        let (service, _) = service();
        let mut config = DeletionConfig::with_strategy(DeletionStrategy::Cascade);
        config.force = true;
        config.confirmed = true;

        let result = service
            .execute_deletion(&[DeletableItem::new(EntityType::ActiveTrade, "1")], &config)
            .await
            .unwrap();
        assert_eq!(result.deleted_items.len(), 3);

        let restored = service
            .restore_backup(result.backup.as_ref().unwrap())
            .await
            .unwrap();
        assert_eq!(restored, 3);

        let stats = service.get_deletion_statistics().await.unwrap();
        assert_eq!(stats.total_items[&EntityType::ActiveTrade], 1);
    }
}
