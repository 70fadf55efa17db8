use crate::domain::deletion::{
    DeletionStatistics, EntityCatalog, EntityRecord, EntityRef, EntityType, RecordStatus,
};
use crate::domain::errors::DeletionError;
use crate::domain::repositories::EntityStore;
use chrono::{Duration, Utc};
use futures_util::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_ARCHIVE_AFTER_DAYS: i64 = 90;

/// Read-only census of the store with maintenance suggestions
#[derive(Clone)]
pub struct StatisticsAggregator {
    store: Arc<dyn EntityStore>,
    archive_after_days: i64,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            archive_after_days: DEFAULT_ARCHIVE_AFTER_DAYS,
        }
    }

    pub fn with_archive_after_days(mut self, days: i64) -> Self {
        self.archive_after_days = days;
        self
    }

    pub async fn stats(&self) -> Result<DeletionStatistics, DeletionError> {
        let listings = join_all(EntityType::ALL.iter().map(|t| self.store.list(*t))).await;

        let mut records: BTreeMap<EntityType, Vec<EntityRecord>> = BTreeMap::new();
        for (entity_type, listing) in EntityType::ALL.iter().zip(listings) {
            let listed = listing
                .map_err(|e| DeletionError::from_store(&EntityRef::new(*entity_type, "*"), &e))?;
            records.insert(*entity_type, listed);
        }

        let mut total_items = BTreeMap::new();
        let mut deletable_items = BTreeMap::new();
        for (entity_type, listed) in &records {
            total_items.insert(*entity_type, listed.len());

            let mut deletable = 0usize;
            for record in listed {
                if self.is_deletable(record).await? {
                    deletable += 1;
                }
            }
            deletable_items.insert(*entity_type, deletable);
        }

        let recommendations = self.recommendations(&records).await?;
        info!(
            "Deletion statistics: {} records, {} deletable, {} recommendations",
            total_items.values().sum::<usize>(),
            deletable_items.values().sum::<usize>(),
            recommendations.len()
        );

        Ok(DeletionStatistics {
            total_items,
            deletable_items,
            recommendations,
            generated_at: Utc::now(),
        })
    }

    /// Not production and nothing critically depends on it
    async fn is_deletable(&self, record: &EntityRecord) -> Result<bool, DeletionError> {
        if record.production {
            return Ok(false);
        }
        Ok(self.critical_dependent_count(record).await? == 0)
    }

    async fn critical_dependent_count(&self, record: &EntityRecord) -> Result<usize, DeletionError> {
        let key = record.key();
        let relations = EntityCatalog::relations(record.entity_type)
            .iter()
            .filter(|r| r.critical);

        let mut count = 0;
        for relation in relations {
            let dependents = self
                .store
                .find_dependents(&key, relation.dependent)
                .await
                .map_err(|e| DeletionError::from_store(&key, &e))?;
            count += dependents.len();
        }
        Ok(count)
    }

    async fn recommendations(
        &self,
        records: &BTreeMap<EntityType, Vec<EntityRecord>>,
    ) -> Result<Vec<String>, DeletionError> {
        let days = self.archive_after_days;
        let cutoff = Duration::try_days(days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| {
                DeletionError::validation(
                    days.to_string(),
                    "archive window is outside the representable date range",
                )
            })?;
        let of = |t: EntityType| records.get(&t).map(Vec::as_slice).unwrap_or_default();

        let mut actions = Vec::new();

        let stale_trades = of(EntityType::ActiveTrade)
            .iter()
            .filter(|r| r.status == RecordStatus::Closed && !r.production && r.updated_at < cutoff)
            .count();
        if stale_trades > 0 {
            actions.push(format!(
                "{} closed trades older than {} days are safe to archive",
                stale_trades, days
            ));
        }

        let mut expired_recommendations = 0;
        for record in of(EntityType::AiTrade)
            .iter()
            .filter(|r| r.status == RecordStatus::Expired && !r.production)
        {
            if self.critical_dependent_count(record).await? == 0 {
                expired_recommendations += 1;
            }
        }
        if expired_recommendations > 0 {
            actions.push(format!(
                "{} expired AI trade recommendations have no dependent trades and can be deleted",
                expired_recommendations
            ));
        }

        let triggered_alerts = of(EntityType::Alert)
            .iter()
            .filter(|r| r.status == RecordStatus::Triggered && !r.production)
            .count();
        if triggered_alerts > 0 {
            actions.push(format!("{} triggered alerts can be cleared", triggered_alerts));
        }

        for history in [EntityType::PriceHistory, EntityType::FeeHistory] {
            let old = of(history)
                .iter()
                .filter(|r| !r.production && r.created_at < cutoff)
                .count();
            if old > 0 {
                actions.push(format!(
                    "{} {} older than {} days can be pruned",
                    old,
                    history.plural_label(),
                    days
                ));
            }
        }

        let existing: BTreeSet<EntityRef> = records
            .values()
            .flat_map(|listed| listed.iter().map(|r| r.key()))
            .collect();
        let dangling = records
            .values()
            .flatten()
            .filter(|r| r.references.iter().any(|target| !existing.contains(target)))
            .count();
        if dangling > 0 {
            actions.push(format!(
                "{} records hold references to records that no longer exist",
                dangling
            ));
        }

        if actions.is_empty() {
            actions.push("No maintenance actions recommended".to_string());
        }

        let protected = records.values().flatten().filter(|r| r.production).count();
        if protected > 0 {
            actions.push(format!(
                "{} production records are protected from deletion",
                protected
            ));
        }

        debug!("Maintenance recommendations: {:?}", actions);
        Ok(actions)
    }
}
