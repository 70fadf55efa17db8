//! Deletion planning
//!
//! Decides, from validated assessments, which records get deleted (and in
//! what order), which are preserved, and which surviving records must have a
//! reference detached. Planning is pure; nothing here touches the store.

use super::assessor::Assessment;
use crate::domain::deletion::{DeletableItem, DeletionStrategy, EntityRef, OrphanedReference};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Default)]
pub struct DeletionPlan {
    /// Dependents before the records they reference
    pub deletions: Vec<EntityRef>,
    pub preserved: Vec<EntityRef>,
    /// References to null before the first delete
    pub detachments: Vec<OrphanedReference>,
    pub warnings: Vec<String>,
    items: BTreeMap<EntityRef, DeletableItem>,
    dependents: BTreeMap<EntityRef, Vec<EntityRef>>,
}

impl DeletionPlan {
    pub fn build(
        strategy: DeletionStrategy,
        assessments: &[Assessment],
        preserve_production: bool,
    ) -> Self {
        let mut items: BTreeMap<EntityRef, DeletableItem> = BTreeMap::new();
        let mut dependents: BTreeMap<EntityRef, Vec<EntityRef>> = BTreeMap::new();
        let mut critical_edges: Vec<(EntityRef, EntityRef)> = Vec::new();
        let mut production: BTreeSet<EntityRef> = BTreeSet::new();

        let roots: Vec<EntityRef> = assessments.iter().map(|a| a.impact.target()).collect();

        // Requested display names win over stored ones
        for assessment in assessments {
            let impact = &assessment.impact;
            items.insert(
                impact.target(),
                DeletableItem {
                    id: impact.target_id.clone(),
                    entity_type: impact.target_type,
                    display_name: impact.display_name.clone(),
                },
            );
            if impact.production {
                production.insert(impact.target());
            }
        }

        for assessment in assessments {
            for (entity, record) in &assessment.graph.records {
                items
                    .entry(entity.clone())
                    .or_insert_with(|| record.to_item());
                if record.production {
                    production.insert(entity.clone());
                }
            }
            for edge in &assessment.graph.edges {
                let child = edge.target();
                let children = dependents.entry(edge.source()).or_default();
                if !children.contains(&child) {
                    children.push(child.clone());
                }
                if edge.critical {
                    critical_edges.push((edge.source(), child));
                }
            }
        }

        let order = post_order(&roots, &dependents);
        let candidates: BTreeSet<EntityRef> = match strategy {
            DeletionStrategy::Cascade => order.iter().cloned().collect(),
            DeletionStrategy::Preserve | DeletionStrategy::WarnAndStop => {
                roots.iter().cloned().collect()
            }
        };

        let mut warnings = Vec::new();
        let mut preserved: BTreeSet<EntityRef> = BTreeSet::new();
        if preserve_production {
            for entity in order.iter().filter(|e| candidates.contains(*e)) {
                if production.contains(entity) {
                    warnings.push(format!(
                        "{} is flagged as production data and was preserved",
                        entity
                    ));
                    preserved.insert(entity.clone());
                }
            }
        }

        // A record stays if anything that critically depends on it stays
        loop {
            let mut changed = false;
            for (dependee, dependent) in &critical_edges {
                let dependent_survives =
                    !candidates.contains(dependent) || preserved.contains(dependent);
                if dependent_survives
                    && candidates.contains(dependee)
                    && preserved.insert(dependee.clone())
                {
                    warnings.push(format!(
                        "{} was preserved because its critical dependent {} is preserved",
                        dependee, dependent
                    ));
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let deletions: Vec<EntityRef> = order
            .iter()
            .filter(|e| candidates.contains(*e) && !preserved.contains(*e))
            .cloned()
            .collect();
        let deleted: BTreeSet<&EntityRef> = deletions.iter().collect();

        let mut detachments = Vec::new();
        for removed in &deletions {
            for child in dependents.get(removed).map(Vec::as_slice).unwrap_or_default() {
                if !deleted.contains(child) {
                    detachments.push(OrphanedReference {
                        dependent: child.clone(),
                        removed_target: removed.clone(),
                    });
                }
            }
        }

        let preserved: Vec<EntityRef> = order
            .iter()
            .filter(|e| preserved.contains(*e))
            .cloned()
            .collect();

        Self {
            deletions,
            preserved,
            detachments,
            warnings,
            items,
            dependents,
        }
    }

    pub fn item(&self, entity: &EntityRef) -> DeletableItem {
        self.items
            .get(entity)
            .cloned()
            .unwrap_or_else(|| DeletableItem::from(entity))
    }

    pub fn deletion_items(&self) -> Vec<DeletableItem> {
        self.deletions.iter().map(|e| self.item(e)).collect()
    }

    pub fn preserved_items(&self) -> Vec<DeletableItem> {
        self.preserved.iter().map(|e| self.item(e)).collect()
    }

    pub fn dependents_of(&self, entity: &EntityRef) -> &[EntityRef] {
        self.dependents
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Records a write will touch, each once: detached dependents, then deletions
    pub fn touched_records(&self) -> Vec<EntityRef> {
        let mut seen = HashSet::new();
        self.detachments
            .iter()
            .map(|d| &d.dependent)
            .chain(self.deletions.iter())
            .filter(|e| seen.insert((*e).clone()))
            .cloned()
            .collect()
    }
}

/// Dependents-first order over every record reachable from `roots`.
/// Iterative, and each record is emitted once, so reference cycles terminate.
fn post_order(
    roots: &[EntityRef],
    dependents: &BTreeMap<EntityRef, Vec<EntityRef>>,
) -> Vec<EntityRef> {
    let mut order = Vec::new();
    let mut visited: HashSet<EntityRef> = HashSet::new();

    for root in roots {
        if !visited.insert(root.clone()) {
            continue;
        }
        let mut stack: Vec<(EntityRef, usize)> = vec![(root.clone(), 0)];
        while let Some((node, next_child)) = stack.pop() {
            let child = dependents
                .get(&node)
                .and_then(|children| children.get(next_child))
                .cloned();
            match child {
                Some(child) => {
                    stack.push((node, next_child + 1));
                    if visited.insert(child.clone()) {
                        stack.push((child, 0));
                    }
                }
                None => order.push(node),
            }
        }
    }

    order
}
