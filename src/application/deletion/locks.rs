use crate::domain::deletion::EntityType;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// One async mutex per entity type. Executions lock every type they may
/// write, always in `EntityType` order, so two requests never wait on each
/// other in a cycle.
#[derive(Clone)]
pub struct EntityTypeLocks {
    locks: Arc<HashMap<EntityType, Arc<Mutex<()>>>>,
}

/// Held for as long as the owning execution may write
pub struct EntityTypeGuard {
    types: Vec<EntityType>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl EntityTypeGuard {
    pub fn types(&self) -> &[EntityType] {
        &self.types
    }
}

impl Drop for EntityTypeGuard {
    fn drop(&mut self) {
        debug!("Released entity type locks {:?}", self.types);
    }
}

impl EntityTypeLocks {
    pub fn new() -> Self {
        let locks = EntityType::ALL
            .iter()
            .map(|t| (*t, Arc::new(Mutex::new(()))))
            .collect();
        Self {
            locks: Arc::new(locks),
        }
    }

    pub async fn acquire(&self, types: &BTreeSet<EntityType>) -> EntityTypeGuard {
        let mut guards = Vec::with_capacity(types.len());
        // BTreeSet iteration is the global lock order
        for entity_type in types {
            if let Some(lock) = self.locks.get(entity_type) {
                guards.push(lock.clone().lock_owned().await);
            }
        }
        debug!("Acquired entity type locks {:?}", types);

        EntityTypeGuard {
            types: types.iter().copied().collect(),
            _guards: guards,
        }
    }
}

impl Default for EntityTypeLocks {
    fn default() -> Self {
        Self::new()
    }
}
