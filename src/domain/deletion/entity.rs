use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every record type the dashboard knows how to delete.
///
/// Adding a variant requires registering its relations in
/// [`EntityCatalog`](super::catalog::EntityCatalog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    AiTrade,
    ActiveTrade,
    LiquidityPosition,
    ChartAnalysis,
    Alert,
    PriceHistory,
    FeeHistory,
}

impl EntityType {
    pub const ALL: [EntityType; 7] = [
        EntityType::AiTrade,
        EntityType::ActiveTrade,
        EntityType::LiquidityPosition,
        EntityType::ChartAnalysis,
        EntityType::Alert,
        EntityType::PriceHistory,
        EntityType::FeeHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::AiTrade => "ai_trade",
            EntityType::ActiveTrade => "active_trade",
            EntityType::LiquidityPosition => "liquidity_position",
            EntityType::ChartAnalysis => "chart_analysis",
            EntityType::Alert => "alert",
            EntityType::PriceHistory => "price_history",
            EntityType::FeeHistory => "fee_history",
        }
    }

    /// Plural label used in operator-facing warnings
    pub fn plural_label(&self) -> &'static str {
        match self {
            EntityType::AiTrade => "AI trade recommendations",
            EntityType::ActiveTrade => "active trades",
            EntityType::LiquidityPosition => "liquidity positions",
            EntityType::ChartAnalysis => "chart analyses",
            EntityType::Alert => "alerts",
            EntityType::PriceHistory => "historical price points",
            EntityType::FeeHistory => "fee history records",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        EntityType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown entity type: {}. Must be one of: {}",
                    s,
                    EntityType::ALL
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Graph node key: one record of one entity type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub id: String,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.id)
    }
}

/// A deletion target as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletableItem {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl DeletableItem {
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn key(&self) -> EntityRef {
        EntityRef::new(self.entity_type, self.id.clone())
    }
}

impl From<&EntityRef> for DeletableItem {
    fn from(entity: &EntityRef) -> Self {
        DeletableItem::new(entity.entity_type, entity.id.clone())
    }
}

/// Parses the `type:id` shorthand used on the command line
impl FromStr for DeletableItem {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_part, id_part) = s
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("Invalid target '{}': expected <type>:<id>", s))?;
        let entity_type = EntityType::from_str(type_part)?;
        let id = id_part.trim();
        if id.is_empty() {
            anyhow::bail!("Invalid target '{}': id is empty", s);
        }
        Ok(DeletableItem::new(entity_type, id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Open,
    Closed,
    Active,
    Triggered,
    Expired,
    Archived,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Open => write!(f, "open"),
            RecordStatus::Closed => write!(f, "closed"),
            RecordStatus::Active => write!(f, "active"),
            RecordStatus::Triggered => write!(f, "triggered"),
            RecordStatus::Expired => write!(f, "expired"),
            RecordStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for RecordStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(RecordStatus::Open),
            "closed" => Ok(RecordStatus::Closed),
            "active" => Ok(RecordStatus::Active),
            "triggered" => Ok(RecordStatus::Triggered),
            "expired" => Ok(RecordStatus::Expired),
            "archived" => Ok(RecordStatus::Archived),
            _ => anyhow::bail!("Invalid record status: {}", s),
        }
    }
}

/// A stored record as seen by the deletion subsystem.
///
/// `references` lists the records this one depends on, which makes this
/// record a dependent of each of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_type: EntityType,
    pub id: String,
    pub display_name: Option<String>,
    pub status: RecordStatus,
    pub production: bool,
    pub references: Vec<EntityRef>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entity_type,
            id: id.into(),
            display_name: None,
            status: RecordStatus::Active,
            production: false,
            references: Vec::new(),
            payload: serde_json::Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn referencing(mut self, entity_type: EntityType, id: impl Into<String>) -> Self {
        self.references.push(EntityRef::new(entity_type, id));
        self
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    pub fn production(mut self) -> Self {
        self.production = true;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at;
        if self.created_at > at {
            self.created_at = at;
        }
        self
    }

    pub fn key(&self) -> EntityRef {
        EntityRef::new(self.entity_type, self.id.clone())
    }

    pub fn references_entity(&self, target: &EntityRef) -> bool {
        self.references.iter().any(|r| r == target)
    }

    pub fn to_item(&self) -> DeletableItem {
        DeletableItem {
            id: self.id.clone(),
            entity_type: self.entity_type,
            display_name: self.display_name.clone(),
        }
    }
}
