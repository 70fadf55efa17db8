use crate::domain::deletion::{DeletionImpact, DeletionStrategy, RecommendationPolicy};
use crate::domain::errors::DeletionError;
use tracing::{debug, warn};

/// Outcome of checking a strategy against a set of impacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyVerdict {
    Approved,
    /// Allowed only once the caller confirms the override
    RequiresConfirmation { reason: String },
    Rejected(Vec<DeletionError>),
}

impl StrategyVerdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, StrategyVerdict::Approved)
    }
}

/// Recommends and validates deletion strategies
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyEngine {
    policy: RecommendationPolicy,
}

impl StrategyEngine {
    pub fn new(policy: RecommendationPolicy) -> Self {
        Self { policy }
    }

    pub fn recommend(&self, impacts: &[DeletionImpact]) -> DeletionStrategy {
        let strategy = if impacts.iter().any(|i| i.has_critical()) {
            self.policy.on_critical
        } else if impacts.iter().any(|i| !i.warnings.is_empty()) {
            self.policy.on_warnings
        } else {
            self.policy.otherwise
        };
        debug!("Recommended strategy for {} impacts: {}", impacts.len(), strategy);
        strategy
    }

    pub fn validate(
        &self,
        strategy: DeletionStrategy,
        impacts: &[DeletionImpact],
        force: bool,
    ) -> StrategyVerdict {
        let critical: Vec<&DeletionImpact> = impacts.iter().filter(|i| i.has_critical()).collect();

        let verdict = if !critical.is_empty() {
            match (strategy, force) {
                (DeletionStrategy::Cascade, true) => StrategyVerdict::RequiresConfirmation {
                    reason: format!(
                        "forced cascade through {} critical dependencies",
                        critical
                            .iter()
                            .map(|i| i.critical_dependencies.len())
                            .sum::<usize>()
                    ),
                },
                (DeletionStrategy::Preserve, _) => StrategyVerdict::Rejected(
                    critical
                        .iter()
                        .map(|i| DeletionError::StrategyRejected {
                            strategy: strategy.to_string(),
                            entity_type: i.target_type,
                            id: i.target_id.clone(),
                            reason: format!(
                                "preserve would orphan critical dependents: {}",
                                i.critical_summary()
                            ),
                        })
                        .collect(),
                ),
                _ => StrategyVerdict::Rejected(critical.iter().map(|i| conflict(i)).collect()),
            }
        } else if strategy == DeletionStrategy::WarnAndStop {
            // Never deletes: every target is reported with what stopped it
            StrategyVerdict::Rejected(
                impacts
                    .iter()
                    .map(|i| {
                        if i.has_dependencies() {
                            conflict(i)
                        } else {
                            DeletionError::StrategyRejected {
                                strategy: strategy.to_string(),
                                entity_type: i.target_type,
                                id: i.target_id.clone(),
                                reason: "warn_and_stop never deletes; no dependencies found, \
                                         use cascade or preserve to remove it"
                                    .to_string(),
                            }
                        }
                    })
                    .collect(),
            )
        } else {
            StrategyVerdict::Approved
        };

        match &verdict {
            StrategyVerdict::Rejected(errors) => {
                warn!("Strategy {} rejected: {} blocking targets", strategy, errors.len())
            }
            StrategyVerdict::RequiresConfirmation { reason } => {
                warn!("Strategy {} requires confirmation: {}", strategy, reason)
            }
            StrategyVerdict::Approved => debug!("Strategy {} approved", strategy),
        }
        verdict
    }
}

fn conflict(impact: &DeletionImpact) -> DeletionError {
    let details = if impact.has_critical() {
        impact.critical_summary()
    } else {
        impact
            .dependent_records()
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    DeletionError::DependencyConflict {
        entity_type: impact.target_type,
        id: impact.target_id.clone(),
        critical_count: impact.critical_dependencies.len(),
        dependent_count: impact.direct_dependencies.len() + impact.indirect_dependencies.len(),
        affected_records: impact.affected_records_count,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deletion::{DependencyEdge, EntityType};

    fn edge(target: (EntityType, &str), critical: bool) -> DependencyEdge {
        DependencyEdge {
            source_type: EntityType::ActiveTrade,
            source_id: "1".to_string(),
            target_type: target.0,
            target_id: target.1.to_string(),
            critical,
            description: "test".to_string(),
            depth: 1,
        }
    }

    fn impact(edges: Vec<DependencyEdge>, warnings: Vec<&str>) -> DeletionImpact {
        let critical = edges.iter().filter(|e| e.critical).cloned().collect();
        let affected = edges.len();
        DeletionImpact {
            target_type: EntityType::ActiveTrade,
            target_id: "1".to_string(),
            display_name: None,
            exists: true,
            production: false,
            direct_dependencies: edges,
            indirect_dependencies: vec![],
            critical_dependencies: critical,
            warnings: warnings.into_iter().map(String::from).collect(),
            alternative_actions: vec![],
            affected_records_count: affected,
        }
    }

    fn scenario() -> Vec<DeletionImpact> {
        vec![impact(
            vec![
                edge((EntityType::Alert, "7"), false),
                edge((EntityType::ChartAnalysis, "50"), true),
            ],
            vec!["will remove 1 alerts"],
        )]
    }

    #[test]
    fn test_default_recommendation_heuristic() {
        let engine = StrategyEngine::default();

        assert_eq!(engine.recommend(&scenario()), DeletionStrategy::WarnAndStop);
        assert_eq!(
            engine.recommend(&[impact(vec![edge((EntityType::Alert, "7"), false)], vec!["x"])]),
            DeletionStrategy::Preserve
        );
        assert_eq!(
            engine.recommend(&[impact(vec![], vec![])]),
            DeletionStrategy::Cascade
        );
    }

    #[test]
    fn test_custom_policy() {
        let engine = StrategyEngine::new(RecommendationPolicy {
            on_critical: DeletionStrategy::WarnAndStop,
            on_warnings: DeletionStrategy::Cascade,
            otherwise: DeletionStrategy::Preserve,
        });
        assert_eq!(
            engine.recommend(&[impact(vec![], vec!["x"])]),
            DeletionStrategy::Cascade
        );
        assert_eq!(
            engine.recommend(&[impact(vec![], vec![])]),
            DeletionStrategy::Preserve
        );
    }

    #[test]
    fn test_critical_blocks_unforced_strategies() {
        let engine = StrategyEngine::default();
        let impacts = scenario();

        for strategy in [
            DeletionStrategy::Cascade,
            DeletionStrategy::Preserve,
            DeletionStrategy::WarnAndStop,
        ] {
            match engine.validate(strategy, &impacts, false) {
                StrategyVerdict::Rejected(errors) => assert_eq!(errors.len(), 1),
                other => panic!("{} should be rejected, got {:?}", strategy, other),
            }
        }

        match engine.validate(DeletionStrategy::Cascade, &impacts, false) {
            StrategyVerdict::Rejected(errors) => match &errors[0] {
                DeletionError::DependencyConflict {
                    critical_count,
                    affected_records,
                    details,
                    ..
                } => {
                    assert_eq!(*critical_count, 1);
                    assert_eq!(*affected_records, 2);
                    assert!(details.contains("chart_analysis#50"));
                }
                other => panic!("unexpected error {:?}", other),
            },
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[test]
    fn test_forced_cascade_requires_confirmation() {
        let engine = StrategyEngine::default();
        assert!(matches!(
            engine.validate(DeletionStrategy::Cascade, &scenario(), true),
            StrategyVerdict::RequiresConfirmation { .. }
        ));
    }

    #[test]
    fn test_preserve_never_allowed_with_critical_even_forced() {
        let engine = StrategyEngine::default();
        match engine.validate(DeletionStrategy::Preserve, &scenario(), true) {
            StrategyVerdict::Rejected(errors) => {
                assert!(matches!(errors[0], DeletionError::StrategyRejected { .. }))
            }
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[test]
    fn test_warn_and_stop_never_approves() {
        let engine = StrategyEngine::default();
        let soft = vec![impact(vec![edge((EntityType::Alert, "7"), false)], vec![])];
        let free = vec![impact(vec![], vec![])];

        match engine.validate(DeletionStrategy::WarnAndStop, &soft, false) {
            StrategyVerdict::Rejected(errors) => {
                assert!(matches!(errors[0], DeletionError::DependencyConflict { .. }))
            }
            other => panic!("unexpected verdict {:?}", other),
        }
        match engine.validate(DeletionStrategy::WarnAndStop, &free, false) {
            StrategyVerdict::Rejected(errors) => {
                assert!(matches!(errors[0], DeletionError::StrategyRejected { .. }))
            }
            other => panic!("unexpected verdict {:?}", other),
        }
        assert!(engine.validate(DeletionStrategy::Cascade, &soft, false).is_approved());
        assert!(engine.validate(DeletionStrategy::Preserve, &soft, false).is_approved());
    }
}
