pub mod assessor;
pub mod executor;
pub mod locks;
pub mod plan;
pub mod resolver;
pub mod service;
pub mod statistics;
pub mod strategy_engine;

pub use assessor::{Assessment, ImpactAssessor};
pub use executor::DeletionExecutor;
pub use locks::EntityTypeLocks;
pub use plan::DeletionPlan;
pub use resolver::{DependencyGraph, DependencyResolver};
pub use service::DeletionService;
pub use statistics::StatisticsAggregator;
pub use strategy_engine::{StrategyEngine, StrategyVerdict};

use crate::domain::deletion::DeletableItem;
use crate::domain::errors::DeletionError;
use std::collections::HashSet;

/// Rejects malformed targets and drops repeats, keeping the first occurrence
pub fn validate_targets(items: &[DeletableItem]) -> Result<Vec<DeletableItem>, DeletionError> {
    if items.is_empty() {
        return Err(DeletionError::validation("", "no deletion targets supplied"));
    }

    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(items.len());
    for item in items {
        let id = item.id.trim();
        if id.is_empty() {
            return Err(DeletionError::validation(
                &item.id,
                format!("{} id is empty", item.entity_type),
            ));
        }
        if id.chars().any(char::is_control) {
            return Err(DeletionError::validation(
                &item.id,
                "id contains control characters",
            ));
        }

        let mut target = item.clone();
        target.id = id.to_string();
        if seen.insert(target.key()) {
            targets.push(target);
        }
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deletion::EntityType;

    #[test]
    fn test_duplicates_collapse_to_first() {
        let targets = validate_targets(&[
            DeletableItem::new(EntityType::Alert, "7").with_display_name("first"),
            DeletableItem::new(EntityType::Alert, " 7 "),
            DeletableItem::new(EntityType::ActiveTrade, "7"),
        ])
        .unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].display_name.as_deref(), Some("first"));
    }

    #[test]
    fn test_malformed_targets_rejected() {
        assert!(validate_targets(&[]).is_err());
        assert!(validate_targets(&[DeletableItem::new(EntityType::Alert, "")]).is_err());
        assert!(validate_targets(&[DeletableItem::new(EntityType::Alert, "a\nb")]).is_err());
    }
}
