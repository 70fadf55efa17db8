use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStrategy {
    /// Delete the target and every dependent
    Cascade,
    /// Delete only the target and orphan soft references to it
    Preserve,
    /// Refuse and explain
    WarnAndStop,
}

impl fmt::Display for DeletionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionStrategy::Cascade => write!(f, "cascade"),
            DeletionStrategy::Preserve => write!(f, "preserve"),
            DeletionStrategy::WarnAndStop => write!(f, "warn_and_stop"),
        }
    }
}

impl FromStr for DeletionStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "cascade" => Ok(DeletionStrategy::Cascade),
            "preserve" => Ok(DeletionStrategy::Preserve),
            "warn_and_stop" | "stop" => Ok(DeletionStrategy::WarnAndStop),
            _ => anyhow::bail!(
                "Invalid deletion strategy: {}. Must be 'cascade', 'preserve', or 'warn_and_stop'",
                s
            ),
        }
    }
}

/// Verbosity of the executor's per-item progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "trace" => Ok(LogLevel::Debug),
            _ => anyhow::bail!("Invalid log level: {}", s),
        }
    }
}

/// Per-request execution options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeletionConfig {
    pub strategy: DeletionStrategy,
    /// Override critical-dependency refusals (cascade only, still needs confirmation)
    pub force: bool,
    pub create_backup: bool,
    pub dry_run: bool,
    pub confirm_before_delete: bool,
    /// The operator confirmed a forced override
    pub confirmed: bool,
    pub log_level: LogLevel,
    pub preserve_production_data: bool,
    /// All-or-nothing: roll back every write on the first failure
    pub atomic: bool,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            strategy: DeletionStrategy::WarnAndStop,
            force: false,
            create_backup: true,
            dry_run: false,
            confirm_before_delete: true,
            confirmed: false,
            log_level: LogLevel::Info,
            preserve_production_data: true,
            atomic: false,
        }
    }
}

impl DeletionConfig {
    pub fn with_strategy(strategy: DeletionStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Forced override counts only when confirmed, unless confirmation is disabled
    pub fn override_confirmed(&self) -> bool {
        self.force && (self.confirmed || !self.confirm_before_delete)
    }
}

/// Priority rule used to recommend a strategy from a set of impacts.
///
/// The default (critical -> stop, warnings -> preserve, otherwise cascade)
/// mirrors what the dashboard's deletion dialogs suggested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationPolicy {
    pub on_critical: DeletionStrategy,
    pub on_warnings: DeletionStrategy,
    pub otherwise: DeletionStrategy,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            on_critical: DeletionStrategy::WarnAndStop,
            on_warnings: DeletionStrategy::Preserve,
            otherwise: DeletionStrategy::Cascade,
        }
    }
}
