//! Impact Assessor
//!
//! Turns resolver graphs into [`DeletionImpact`]s: partitions edges by depth,
//! pulls out the critical ones and writes the warnings and alternative actions
//! a user sees before confirming a deletion.

use super::resolver::{DependencyGraph, DependencyResolver};
use super::strategy_engine::StrategyEngine;
use crate::domain::deletion::{
    DeletableItem, DeletionImpact, EntityRef, EntityType, ImpactReport,
    impact::combined_affected_records,
};
use crate::domain::errors::DeletionError;
use crate::domain::repositories::EntityStore;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// A target's impact together with the graph it was derived from
#[derive(Debug, Clone)]
pub struct Assessment {
    pub impact: DeletionImpact,
    pub graph: DependencyGraph,
}

#[derive(Clone)]
pub struct ImpactAssessor {
    store: Arc<dyn EntityStore>,
    resolver: DependencyResolver,
}

impl ImpactAssessor {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        let resolver = DependencyResolver::new(store.clone());
        Self { store, resolver }
    }

    /// Impacts for every target that could be assessed, plus the failures
    pub async fn assess(
        &self,
        targets: &[DeletableItem],
    ) -> (Vec<DeletionImpact>, Vec<DeletionError>) {
        let mut impacts = Vec::new();
        let mut failures = Vec::new();
        for outcome in self.assess_with_graphs(targets).await {
            match outcome {
                Ok(assessment) => impacts.push(assessment.impact),
                Err(e) => failures.push(e),
            }
        }
        (impacts, failures)
    }

    /// Per-target outcome, in request order
    pub async fn assess_with_graphs(
        &self,
        targets: &[DeletableItem],
    ) -> Vec<Result<Assessment, DeletionError>> {
        let resolutions = self.resolver.resolve(targets).await;
        let mut outcomes = Vec::with_capacity(targets.len());

        for (item, resolution) in targets.iter().zip(resolutions) {
            let outcome = match resolution {
                Ok(graph) => self.assess_graph(item, graph).await,
                Err(e) => Err(e),
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn assess_graph(
        &self,
        item: &DeletableItem,
        graph: DependencyGraph,
    ) -> Result<Assessment, DeletionError> {
        let target = item.key();
        let record = self
            .store
            .get(&target)
            .await
            .map_err(|e| DeletionError::from_store(&target, &e))?;

        let exists = record.is_some();
        let production = record.as_ref().is_some_and(|r| r.production);
        let display_name = item
            .display_name
            .clone()
            .or_else(|| record.as_ref().and_then(|r| r.display_name.clone()));

        let impact = build_impact(&target, display_name, exists, production, &graph);
        debug!(
            "Assessed {}: {} direct, {} indirect, {} critical, {} affected",
            target,
            impact.direct_dependencies.len(),
            impact.indirect_dependencies.len(),
            impact.critical_dependencies.len(),
            impact.affected_records_count
        );

        Ok(Assessment { impact, graph })
    }

    /// Bundles impacts into a report with a combined count and a recommendation
    pub fn summarize(
        &self,
        engine: &StrategyEngine,
        impacts: Vec<DeletionImpact>,
        failures: Vec<DeletionError>,
    ) -> ImpactReport {
        let total_affected_records = combined_affected_records(&impacts);
        let recommended_strategy = engine.recommend(&impacts);
        info!(
            "Impact report: {} assessed, {} failed, {} affected records, recommending {}",
            impacts.len(),
            failures.len(),
            total_affected_records,
            recommended_strategy
        );

        ImpactReport {
            impacts,
            failures,
            total_affected_records,
            recommended_strategy,
        }
    }
}

fn build_impact(
    target: &EntityRef,
    display_name: Option<String>,
    exists: bool,
    production: bool,
    graph: &DependencyGraph,
) -> DeletionImpact {
    let (direct, indirect): (Vec<_>, Vec<_>) =
        graph.edges.iter().cloned().partition(|e| e.is_direct());
    let critical: Vec<_> = graph.edges.iter().filter(|e| e.critical).cloned().collect();

    let mut impact = DeletionImpact {
        target_type: target.entity_type,
        target_id: target.id.clone(),
        display_name,
        exists,
        production,
        direct_dependencies: direct,
        indirect_dependencies: indirect,
        critical_dependencies: critical,
        warnings: Vec::new(),
        alternative_actions: Vec::new(),
        affected_records_count: 0,
    };
    impact.affected_records_count = impact.dependent_records().len();
    impact.warnings = warnings_for(&impact, graph);
    impact.alternative_actions = alternatives_for(&impact, graph);
    impact
}

fn label(impact: &DeletionImpact) -> String {
    match &impact.display_name {
        Some(name) => format!("{} '{}'", impact.target(), name),
        None => impact.target().to_string(),
    }
}

fn warnings_for(impact: &DeletionImpact, graph: &DependencyGraph) -> Vec<String> {
    let mut warnings = Vec::new();
    let subject = label(impact);

    if !impact.exists {
        warnings.push(format!("{} no longer exists; deleting it is a no-op", subject));
    }

    if impact.production {
        warnings.push(format!("{} is flagged as production data", subject));
    }

    // Records behind a critical edge are reported as critical, never as soft removals
    let critical_records = impact.critical_records();
    let mut soft_by_type: BTreeMap<EntityType, BTreeSet<EntityRef>> = BTreeMap::new();
    for record in impact.dependent_records() {
        if !critical_records.contains(&record) {
            soft_by_type
                .entry(record.entity_type)
                .or_default()
                .insert(record);
        }
    }
    for (entity_type, records) in &soft_by_type {
        warnings.push(format!(
            "Deleting {} will remove {} {}",
            subject,
            records.len(),
            entity_type.plural_label()
        ));
    }

    let production_dependents = impact
        .dependent_records()
        .iter()
        .filter(|r| graph.is_production(r))
        .count();
    if production_dependents > 0 {
        warnings.push(format!(
            "{} dependent records of {} are flagged as production data",
            production_dependents, subject
        ));
    }

    let indirect: BTreeSet<EntityRef> = impact
        .indirect_dependencies
        .iter()
        .map(|e| e.target())
        .collect();
    if !indirect.is_empty() {
        warnings.push(format!(
            "{} records are reached indirectly through other dependents",
            indirect.len()
        ));
    }

    warnings
}

fn alternatives_for(impact: &DeletionImpact, graph: &DependencyGraph) -> Vec<String> {
    let mut actions = Vec::new();

    if impact.has_critical() {
        actions.push(format!(
            "Archive {} instead of deleting it",
            impact.target()
        ));
        actions.push(format!(
            "Resolve or reassign the critical dependents first: {}",
            impact
                .critical_records()
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        actions.push(
            "Re-run with force and explicit confirmation to cascade through critical dependents"
                .to_string(),
        );
    } else if impact.has_dependencies() {
        actions.push(
            "Use the preserve strategy to keep dependents and detach their references".to_string(),
        );
    }

    let production_involved = impact.production
        || impact
            .dependent_records()
            .iter()
            .any(|r| graph.is_production(r));
    if production_involved {
        actions.push("Export production data before deleting".to_string());
    }

    actions
}
