//! Entity Catalog
//!
//! Static registry of which entity types may reference which. The catalog
//! only defines *possible* edges; the store confirms which ones exist.
//!
//! Relations are listed in the order the resolver visits them, which is also
//! the order sibling dependents are removed in during a cascade.

use super::entity::EntityType;
use std::collections::BTreeSet;

/// `dependent` records may reference a record of the owning type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub dependent: EntityType,
    /// Losing the referenced record would corrupt the dependent, not just its display
    pub critical: bool,
    pub description: &'static str,
}

const fn soft(dependent: EntityType, description: &'static str) -> Relation {
    Relation {
        dependent,
        critical: false,
        description,
    }
}

const fn critical(dependent: EntityType, description: &'static str) -> Relation {
    Relation {
        dependent,
        critical: true,
        description,
    }
}

const AI_TRADE_RELATIONS: &[Relation] = &[
    critical(
        EntityType::ActiveTrade,
        "trade was opened from this recommendation",
    ),
    soft(EntityType::Alert, "alert watches this recommendation"),
];

const ACTIVE_TRADE_RELATIONS: &[Relation] = &[
    soft(
        EntityType::Alert,
        "alert tracks this trade for historical display",
    ),
    critical(
        EntityType::ChartAnalysis,
        "analysis is used for performance attribution of this trade",
    ),
];

const LIQUIDITY_POSITION_RELATIONS: &[Relation] = &[
    soft(
        EntityType::PriceHistory,
        "historical price point of this position",
    ),
    soft(EntityType::FeeHistory, "fee accrual record of this position"),
    soft(EntityType::Alert, "alert on this position's price range"),
];

const CHART_ANALYSIS_RELATIONS: &[Relation] = &[
    critical(
        EntityType::AiTrade,
        "recommendation rationale is derived from this analysis",
    ),
    soft(EntityType::Alert, "alert was created from this analysis"),
];

const NO_RELATIONS: &[Relation] = &[];

pub struct EntityCatalog;

impl EntityCatalog {
    /// Relations whose dependents may reference a record of `entity_type`
    pub fn relations(entity_type: EntityType) -> &'static [Relation] {
        match entity_type {
            EntityType::AiTrade => AI_TRADE_RELATIONS,
            EntityType::ActiveTrade => ACTIVE_TRADE_RELATIONS,
            EntityType::LiquidityPosition => LIQUIDITY_POSITION_RELATIONS,
            EntityType::ChartAnalysis => CHART_ANALYSIS_RELATIONS,
            EntityType::Alert | EntityType::PriceHistory | EntityType::FeeHistory => NO_RELATIONS,
        }
    }

    pub fn relation(dependee: EntityType, dependent: EntityType) -> Option<&'static Relation> {
        Self::relations(dependee)
            .iter()
            .find(|r| r.dependent == dependent)
    }

    pub fn is_critical(dependee: EntityType, dependent: EntityType) -> bool {
        Self::relation(dependee, dependent).is_some_and(|r| r.critical)
    }

    /// Every type whose records could be touched when deleting records of `types`,
    /// the starting types included.
    pub fn reachable_types(types: impl IntoIterator<Item = EntityType>) -> BTreeSet<EntityType> {
        let mut reached: BTreeSet<EntityType> = BTreeSet::new();
        let mut stack: Vec<EntityType> = types.into_iter().collect();

        while let Some(entity_type) = stack.pop() {
            if !reached.insert(entity_type) {
                continue;
            }
            for relation in Self::relations(entity_type) {
                if !reached.contains(&relation.dependent) {
                    stack.push(relation.dependent);
                }
            }
        }

        reached
    }
}
