use tradelens::application::deletion::{DeletionService, EntityTypeLocks};
use tradelens::domain::deletion::{
    DeletableItem, DeletionConfig, DeletionStrategy, EntityRecord, EntityRef, EntityType,
};
use tradelens::infrastructure::mock::{MockEntityStore, StoreWrite};

use std::sync::Arc;
use std::time::Duration;

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

fn forced_cascade() -> DeletionConfig {
    let mut config = DeletionConfig::with_strategy(DeletionStrategy::Cascade);
    config.force = true;
    config.confirmed = true;
    config
}

/// Test: a request touching a type that is mid-execution waits, then re-validates
///
/// The alert request overlaps the trade cascade on the alert type, so its delete
/// must not interleave with the cascade's writes.
#[tokio::test]
async fn test_overlapping_requests_are_serialized() {
    let store = MockEntityStore::with_records(trade_scenario());
    store.set_delete_delay(Duration::from_millis(50));
    let service = Arc::new(DeletionService::new(Arc::new(store.clone())));

    let cascade_service = service.clone();
    let cascade = tokio::spawn(async move {
        cascade_service
            .execute_deletion(
                &[DeletableItem::new(EntityType::ActiveTrade, "1")],
                &forced_cascade(),
            )
            .await
    });

    // Let the cascade take its locks first
    tokio::time::sleep(Duration::from_millis(10)).await;

    let alert_service = service.clone();
    let alert = tokio::spawn(async move {
        alert_service
            .execute_deletion(
                &[DeletableItem::new(EntityType::Alert, "7")],
                &DeletionConfig::with_strategy(DeletionStrategy::Cascade),
            )
            .await
    });

    let cascade_result = cascade.await.unwrap().unwrap();
    let alert_result = alert.await.unwrap().unwrap();

    assert!(cascade_result.success);
    assert!(alert_result.success);
    assert!(alert_result.started_at <= cascade_result.completed_at);
    assert!(alert_result.completed_at >= cascade_result.completed_at);

    // Already gone when the alert request re-validated: satisfied, not failed
    assert_eq!(alert_result.deleted_refs(), vec![r(EntityType::Alert, "7")]);

    let writes = store.writes().await;
    assert_eq!(
        writes[..3],
        [
            StoreWrite::Delete(r(EntityType::Alert, "7")),
            StoreWrite::Delete(r(EntityType::ChartAnalysis, "50")),
            StoreWrite::Delete(r(EntityType::ActiveTrade, "1")),
        ]
    );
    assert!(store.inner().is_empty().await);
}

#[tokio::test]
async fn test_services_sharing_locks_serialize() {
    let store = MockEntityStore::with_records(trade_scenario());
    store.set_delete_delay(Duration::from_millis(40));
    let locks = EntityTypeLocks::new();

    let first = Arc::new(
        DeletionService::new(Arc::new(store.clone())).with_locks(locks.clone()),
    );
    let second = Arc::new(DeletionService::new(Arc::new(store.clone())).with_locks(locks));

    let first_task = {
        let service = first.clone();
        tokio::spawn(async move {
            service
                .execute_deletion(
                    &[DeletableItem::new(EntityType::ActiveTrade, "1")],
                    &forced_cascade(),
                )
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    // The analysis is queued behind the cascade, which deletes it first
    let second_result = second
        .execute_deletion(
            &[DeletableItem::new(EntityType::ChartAnalysis, "50")],
            &DeletionConfig::with_strategy(DeletionStrategy::Preserve),
        )
        .await
        .unwrap();
    let first_result = first_task.await.unwrap().unwrap();

    assert!(first_result.success);
    assert!(second_result.success);
    assert!(second_result.completed_at >= first_result.completed_at);
    assert_eq!(
        store
            .deletions()
            .await
            .iter()
            .filter(|d| **d == r(EntityType::ChartAnalysis, "50"))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_assessment_does_not_wait_for_writes() {
    let store = MockEntityStore::with_records(trade_scenario());
    store.set_delete_delay(Duration::from_millis(200));
    let service = Arc::new(DeletionService::new(Arc::new(store.clone())));

    let writer = service.clone();
    let cascade = tokio::spawn(async move {
        writer
            .execute_deletion(
                &[DeletableItem::new(EntityType::ActiveTrade, "1")],
                &forced_cascade(),
            )
            .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let report = tokio::time::timeout(
        Duration::from_millis(150),
        service.assess_bulk_deletion_impact(&[DeletableItem::new(EntityType::Alert, "7")]),
    )
    .await
    .expect("assessment is read-only and takes no locks")
    .unwrap();
    assert_eq!(report.impacts.len(), 1);

    assert!(cascade.await.unwrap().unwrap().success);
}
