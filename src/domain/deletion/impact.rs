use super::entity::{EntityRef, EntityType};
use super::strategy::DeletionStrategy;
use crate::domain::errors::DeletionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Directed edge: `source` cannot be safely removed while `target` exists,
/// for the reason in `description`. `target` is the dependent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub source_type: EntityType,
    pub source_id: String,
    pub target_type: EntityType,
    pub target_id: String,
    pub critical: bool,
    pub description: String,
    /// Hops from the requested target; 1 means direct
    pub depth: usize,
}

/// Identity of an edge in the visited set
pub type EdgeKey = (EntityType, String, EntityType, String);

impl DependencyEdge {
    pub fn source(&self) -> EntityRef {
        EntityRef::new(self.source_type, self.source_id.clone())
    }

    pub fn target(&self) -> EntityRef {
        EntityRef::new(self.target_type, self.target_id.clone())
    }

    pub fn key(&self) -> EdgeKey {
        (
            self.source_type,
            self.source_id.clone(),
            self.target_type,
            self.target_id.clone(),
        )
    }

    pub fn is_direct(&self) -> bool {
        self.depth <= 1
    }
}

/// Blast radius of deleting one requested target. Computed on demand, never
/// persisted: it is stale as soon as the store changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionImpact {
    pub target_type: EntityType,
    pub target_id: String,
    pub display_name: Option<String>,
    pub exists: bool,
    pub production: bool,
    pub direct_dependencies: Vec<DependencyEdge>,
    pub indirect_dependencies: Vec<DependencyEdge>,
    pub critical_dependencies: Vec<DependencyEdge>,
    pub warnings: Vec<String>,
    pub alternative_actions: Vec<String>,
    pub affected_records_count: usize,
}

impl DeletionImpact {
    pub fn target(&self) -> EntityRef {
        EntityRef::new(self.target_type, self.target_id.clone())
    }

    pub fn has_critical(&self) -> bool {
        !self.critical_dependencies.is_empty()
    }

    pub fn has_dependencies(&self) -> bool {
        !self.direct_dependencies.is_empty() || !self.indirect_dependencies.is_empty()
    }

    pub fn all_dependencies(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.direct_dependencies
            .iter()
            .chain(self.indirect_dependencies.iter())
    }

    /// Distinct dependent records, however many paths reach them
    pub fn dependent_records(&self) -> BTreeSet<EntityRef> {
        self.all_dependencies().map(|e| e.target()).collect()
    }

    /// Dependent records reached by at least one critical edge
    pub fn critical_records(&self) -> BTreeSet<EntityRef> {
        self.critical_dependencies.iter().map(|e| e.target()).collect()
    }

    /// One line per critical dependency, used when refusing a deletion
    pub fn critical_summary(&self) -> String {
        self.critical_dependencies
            .iter()
            .map(|e| format!("{} ({})", e.target(), e.description))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Result of a bulk assessment: the per-target impacts plus the targets that
/// could not be assessed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactReport {
    pub impacts: Vec<DeletionImpact>,
    pub failures: Vec<DeletionError>,
    /// Dependent records across all targets, each counted once, targets excluded
    pub total_affected_records: usize,
    pub recommended_strategy: DeletionStrategy,
}

impl ImpactReport {
    pub fn has_critical(&self) -> bool {
        self.impacts.iter().any(|i| i.has_critical())
    }

    pub fn impact_for(&self, target: &EntityRef) -> Option<&DeletionImpact> {
        self.impacts.iter().find(|i| &i.target() == target)
    }
}

/// Counts dependent records across `impacts` once each, ignoring records
/// that are themselves among the requested targets.
pub fn combined_affected_records(impacts: &[DeletionImpact]) -> usize {
    let targets: BTreeSet<EntityRef> = impacts.iter().map(|i| i.target()).collect();
    impacts
        .iter()
        .flat_map(|i| i.dependent_records())
        .filter(|r| !targets.contains(r))
        .collect::<BTreeSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(
        source: (EntityType, &str),
        target: (EntityType, &str),
        critical: bool,
        depth: usize,
    ) -> DependencyEdge {
        DependencyEdge {
            source_type: source.0,
            source_id: source.1.to_string(),
            target_type: target.0,
            target_id: target.1.to_string(),
            critical,
            description: "test".to_string(),
            depth,
        }
    }

    fn impact(target: (EntityType, &str), edges: Vec<DependencyEdge>) -> DeletionImpact {
        let (direct, indirect): (Vec<_>, Vec<_>) = edges.into_iter().partition(|e| e.is_direct());
        let critical = direct
            .iter()
            .chain(indirect.iter())
            .filter(|e| e.critical)
            .cloned()
            .collect();
        let mut impact = DeletionImpact {
            target_type: target.0,
            target_id: target.1.to_string(),
            display_name: None,
            exists: true,
            production: false,
            direct_dependencies: direct,
            indirect_dependencies: indirect,
            critical_dependencies: critical,
            warnings: vec![],
            alternative_actions: vec![],
            affected_records_count: 0,
        };
        impact.affected_records_count = impact.dependent_records().len();
        impact
    }

    #[test]
    fn test_record_reached_twice_counted_once() {
        let analysis = (EntityType::ChartAnalysis, "50");
        let rec = (EntityType::AiTrade, "9");
        let alert = (EntityType::Alert, "3");

        let impact = impact(
            analysis,
            vec![
                edge(analysis, rec, true, 1),
                edge(analysis, alert, false, 1),
                edge(rec, alert, false, 2),
            ],
        );

        assert_eq!(impact.direct_dependencies.len(), 2);
        assert_eq!(impact.indirect_dependencies.len(), 1);
        assert_eq!(impact.affected_records_count, 2);
    }

    #[test]
    fn test_combined_count_dedupes_shared_dependents() {
        let position_a = (EntityType::LiquidityPosition, "a");
        let position_b = (EntityType::LiquidityPosition, "b");
        let shared_alert = (EntityType::Alert, "shared");

        let impacts = vec![
            impact(position_a, vec![edge(position_a, shared_alert, false, 1)]),
            impact(position_b, vec![edge(position_b, shared_alert, false, 1)]),
        ];

        assert_eq!(combined_affected_records(&impacts), 1);
    }

    #[test]
    fn test_combined_count_excludes_targets() {
        let trade = (EntityType::ActiveTrade, "1");
        let alert = (EntityType::Alert, "7");

        let impacts = vec![
            impact(trade, vec![edge(trade, alert, false, 1)]),
            impact(alert, vec![]),
        ];

        assert_eq!(combined_affected_records(&impacts), 0);
    }
}
