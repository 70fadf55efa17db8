use crate::domain::deletion::{EntityRecord, EntityRef, EntityType, RecordSnapshot};
use crate::domain::errors::StoreError;
use crate::domain::repositories::EntityStore;
use crate::infrastructure::repositories::InMemoryEntityStore;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// A write observed by [`MockEntityStore`], in the order it reached the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    Delete(EntityRef),
    Detach {
        dependent: EntityRef,
        target: EntityRef,
    },
    Restore(EntityRef),
}

/// In-memory store that records every write and can inject failures.
#[derive(Clone)]
pub struct MockEntityStore {
    inner: InMemoryEntityStore,
    writes: Arc<RwLock<Vec<StoreWrite>>>,
    failing_deletes: Arc<RwLock<HashSet<EntityRef>>>,
    failing_lookups: Arc<RwLock<HashSet<EntityRef>>>,
    unavailable: Arc<AtomicBool>,
    delete_delay_ms: Arc<AtomicU64>,
}

impl MockEntityStore {
    pub fn new(inner: InMemoryEntityStore) -> Self {
        Self {
            inner,
            writes: Arc::new(RwLock::new(Vec::new())),
            failing_deletes: Arc::new(RwLock::new(HashSet::new())),
            failing_lookups: Arc::new(RwLock::new(HashSet::new())),
            unavailable: Arc::new(AtomicBool::new(false)),
            delete_delay_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_records(records: impl IntoIterator<Item = EntityRecord>) -> Self {
        Self::new(InMemoryEntityStore::with_records(records))
    }

    pub fn inner(&self) -> &InMemoryEntityStore {
        &self.inner
    }

    /// Deleting `entity` fails with a backend error
    pub async fn fail_delete(&self, entity: EntityRef) {
        self.failing_deletes.write().await.insert(entity);
    }

    /// Looking up dependents of `entity` fails as if the store went away
    pub async fn fail_lookups_for(&self, entity: EntityRef) {
        self.failing_lookups.write().await.insert(entity);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Slow every delete down, to widen race windows in concurrency tests
    pub fn set_delete_delay(&self, delay: Duration) {
        self.delete_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn writes(&self) -> Vec<StoreWrite> {
        self.writes.read().await.clone()
    }

    pub async fn deletions(&self) -> Vec<EntityRef> {
        self.writes
            .read()
            .await
            .iter()
            .filter_map(|w| match w {
                StoreWrite::Delete(entity) => Some(entity.clone()),
                _ => None,
            })
            .collect()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("mock store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for MockEntityStore {
    async fn exists(&self, entity: &EntityRef) -> Result<bool, StoreError> {
        self.check_available()?;
        self.inner.exists(entity).await
    }

    async fn get(&self, entity: &EntityRef) -> Result<Option<EntityRecord>, StoreError> {
        self.check_available()?;
        self.inner.get(entity).await
    }

    async fn list(&self, entity_type: EntityType) -> Result<Vec<EntityRecord>, StoreError> {
        self.check_available()?;
        self.inner.list(entity_type).await
    }

    async fn find_dependents(
        &self,
        target: &EntityRef,
        dependent_type: EntityType,
    ) -> Result<Vec<EntityRecord>, StoreError> {
        self.check_available()?;
        if self.failing_lookups.read().await.contains(target) {
            return Err(StoreError::Unavailable(format!(
                "connection reset while reading dependents of {}",
                target
            )));
        }
        self.inner.find_dependents(target, dependent_type).await
    }

    async fn delete(&self, entity: &EntityRef) -> Result<bool, StoreError> {
        self.check_available()?;
        let delay = self.delete_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing_deletes.read().await.contains(entity) {
            debug!("MockEntityStore: injected delete failure for {}", entity);
            return Err(StoreError::Backend(format!("constraint violation on {}", entity)));
        }
        self.writes
            .write()
            .await
            .push(StoreWrite::Delete(entity.clone()));
        self.inner.delete(entity).await
    }

    async fn snapshot(&self, entity: &EntityRef) -> Result<Option<RecordSnapshot>, StoreError> {
        self.check_available()?;
        self.inner.snapshot(entity).await
    }

    async fn detach_reference(
        &self,
        dependent: &EntityRef,
        target: &EntityRef,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        self.writes.write().await.push(StoreWrite::Detach {
            dependent: dependent.clone(),
            target: target.clone(),
        });
        self.inner.detach_reference(dependent, target).await
    }

    async fn restore(&self, snapshot: &RecordSnapshot) -> Result<(), StoreError> {
        self.check_available()?;
        self.writes
            .write()
            .await
            .push(StoreWrite::Restore(snapshot.entity.clone()));
        self.inner.restore(snapshot).await
    }
}
