//! Dependency Resolver
//!
//! Breadth-first walk from each target over the catalog's relations, asking
//! the store at every hop which dependents actually exist. Lookups for one
//! BFS level are issued concurrently; results are consumed in catalog order so
//! the edge list is deterministic.

use crate::domain::deletion::impact::EdgeKey;
use crate::domain::deletion::{
    DeletableItem, DependencyEdge, EntityCatalog, EntityRecord, EntityRef,
};
use crate::domain::errors::{DeletionError, StoreError};
use crate::domain::repositories::EntityStore;
use futures_util::future::join_all;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// Dependents of one requested target, edges in BFS order
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyGraph {
    pub root: EntityRef,
    pub edges: Vec<DependencyEdge>,
    /// Every dependent record reached, as read during the walk
    pub records: BTreeMap<EntityRef, EntityRecord>,
}

impl DependencyGraph {
    pub fn direct(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(|e| e.is_direct())
    }

    pub fn indirect(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(|e| !e.is_direct())
    }

    /// Edges leaving `source`, in discovery order
    pub fn dependents_of<'a>(
        &'a self,
        source: &'a EntityRef,
    ) -> impl Iterator<Item = &'a DependencyEdge> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.source_type == source.entity_type && e.source_id == source.id)
    }

    pub fn is_production(&self, entity: &EntityRef) -> bool {
        self.records.get(entity).is_some_and(|r| r.production)
    }
}

/// Outcome for one target: either its full graph or why it could not be built
pub type Resolution = Result<DependencyGraph, DeletionError>;

#[derive(Clone)]
pub struct DependencyResolver {
    store: Arc<dyn EntityStore>,
}

impl DependencyResolver {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Resolves every target independently; one target's store failure does
    /// not affect the others.
    pub async fn resolve(&self, targets: &[DeletableItem]) -> Vec<Resolution> {
        let mut resolutions = Vec::with_capacity(targets.len());
        for target in targets {
            resolutions.push(self.resolve_one(&target.key()).await);
        }
        resolutions
    }

    pub async fn resolve_one(&self, root: &EntityRef) -> Resolution {
        self.walk(root).await.map_err(|(entity, err)| {
            warn!(
                "Dependency walk for {} failed at {}: {}",
                root, entity, err
            );
            // Attribute the failure to the requested target, naming the hop that broke
            let reason = format!("while reading dependents of {}: {}", entity, err);
            if err.is_unavailable() {
                DeletionError::StoreUnavailable {
                    entity_type: root.entity_type,
                    id: root.id.clone(),
                    reason,
                }
            } else {
                DeletionError::Store {
                    entity_type: root.entity_type,
                    id: root.id.clone(),
                    reason,
                }
            }
        })
    }

    async fn walk(&self, root: &EntityRef) -> Result<DependencyGraph, (EntityRef, StoreError)> {
        let mut edges: Vec<DependencyEdge> = Vec::new();
        let mut visited_edges: HashSet<EdgeKey> = HashSet::new();
        let mut expanded: HashSet<EntityRef> = HashSet::new();
        let mut records: BTreeMap<EntityRef, EntityRecord> = BTreeMap::new();
        let mut frontier: VecDeque<EntityRef> = VecDeque::from([root.clone()]);
        let mut depth = 0usize;

        expanded.insert(root.clone());

        while !frontier.is_empty() {
            depth += 1;
            let level: Vec<EntityRef> = frontier.drain(..).collect();

            // (source, relation) pairs for the whole level, queried concurrently
            let lookups: Vec<_> = level
                .iter()
                .flat_map(|source| {
                    EntityCatalog::relations(source.entity_type)
                        .iter()
                        .map(move |relation| (source, relation))
                })
                .collect();

            let results = join_all(lookups.iter().map(|(source, relation)| {
                self.store.find_dependents(source, relation.dependent)
            }))
            .await;

            for ((source, relation), result) in lookups.iter().zip(results) {
                let dependents = result.map_err(|err| ((*source).clone(), err))?;

                for dependent in dependents {
                    let target = dependent.key();
                    if &target == root {
                        debug!("Reference cycle back to {} via {} ignored", root, source);
                        continue;
                    }

                    let edge = DependencyEdge {
                        source_type: source.entity_type,
                        source_id: source.id.clone(),
                        target_type: target.entity_type,
                        target_id: target.id.clone(),
                        critical: relation.critical,
                        description: format!(
                            "{} references {}: {}",
                            target, source, relation.description
                        ),
                        depth,
                    };

                    if !visited_edges.insert(edge.key()) {
                        continue;
                    }
                    edges.push(edge);

                    if expanded.insert(target.clone()) {
                        records.insert(target.clone(), dependent);
                        frontier.push_back(target);
                    }
                }
            }
        }

        debug!(
            "Resolved {} dependency edges for {} ({} records)",
            edges.len(),
            root,
            expanded.len() - 1
        );

        Ok(DependencyGraph {
            root: root.clone(),
            edges,
            records,
        })
    }
}
