//! Deletion defaults parsing from environment variables.
//!
//! Covers the request defaults used when a caller does not override them, the
//! strategy recommendation policy and the archive window used in statistics.

use crate::domain::deletion::{DeletionConfig, DeletionStrategy, LogLevel, RecommendationPolicy};
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Upper bound for `DELETION_ARCHIVE_AFTER_DAYS` (100 years)
pub const MAX_ARCHIVE_AFTER_DAYS: i64 = 36_500;

/// Deletion environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionEnvConfig {
    pub default_strategy: DeletionStrategy,
    pub create_backup: bool,
    pub dry_run: bool,
    pub confirm_before_delete: bool,
    pub preserve_production_data: bool,
    pub atomic: bool,
    pub log_level: LogLevel,

    // Recommendation policy
    pub policy: RecommendationPolicy,

    // Statistics
    pub archive_after_days: i64,
}

impl Default for DeletionEnvConfig {
    fn default() -> Self {
        let request = DeletionConfig::default();
        Self {
            default_strategy: request.strategy,
            create_backup: request.create_backup,
            dry_run: request.dry_run,
            confirm_before_delete: request.confirm_before_delete,
            preserve_production_data: request.preserve_production_data,
            atomic: request.atomic,
            log_level: request.log_level,
            policy: RecommendationPolicy::default(),
            archive_after_days: 90,
        }
    }
}

impl DeletionEnvConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let policy = RecommendationPolicy {
            on_critical: Self::parse_strategy(
                "DELETION_POLICY_ON_CRITICAL",
                defaults.policy.on_critical,
            )?,
            on_warnings: Self::parse_strategy(
                "DELETION_POLICY_ON_WARNINGS",
                defaults.policy.on_warnings,
            )?,
            otherwise: Self::parse_strategy("DELETION_POLICY_DEFAULT", defaults.policy.otherwise)?,
        };

        let archive_after_days = env::var("DELETION_ARCHIVE_AFTER_DAYS")
            .unwrap_or_else(|_| defaults.archive_after_days.to_string())
            .parse::<i64>()
            .context("Failed to parse DELETION_ARCHIVE_AFTER_DAYS")?;
        if !(0..=MAX_ARCHIVE_AFTER_DAYS).contains(&archive_after_days) {
            anyhow::bail!(
                "DELETION_ARCHIVE_AFTER_DAYS must be between 0 and {}, got {}",
                MAX_ARCHIVE_AFTER_DAYS,
                archive_after_days
            );
        }

        let log_level_str =
            env::var("DELETION_LOG_LEVEL").unwrap_or_else(|_| defaults.log_level.to_string());

        Ok(Self {
            default_strategy: Self::parse_strategy(
                "DELETION_DEFAULT_STRATEGY",
                defaults.default_strategy,
            )?,
            create_backup: Self::parse_bool("DELETION_CREATE_BACKUP", defaults.create_backup)?,
            dry_run: Self::parse_bool("DELETION_DRY_RUN", defaults.dry_run)?,
            confirm_before_delete: Self::parse_bool(
                "DELETION_CONFIRM_BEFORE_DELETE",
                defaults.confirm_before_delete,
            )?,
            preserve_production_data: Self::parse_bool(
                "DELETION_PRESERVE_PRODUCTION_DATA",
                defaults.preserve_production_data,
            )?,
            atomic: Self::parse_bool("DELETION_ATOMIC", defaults.atomic)?,
            log_level: LogLevel::from_str(&log_level_str)
                .context("Failed to parse DELETION_LOG_LEVEL")?,
            policy,
            archive_after_days,
        })
    }

    /// Request options seeded from these defaults
    pub fn request_defaults(&self) -> DeletionConfig {
        DeletionConfig {
            strategy: self.default_strategy,
            create_backup: self.create_backup,
            dry_run: self.dry_run,
            confirm_before_delete: self.confirm_before_delete,
            preserve_production_data: self.preserve_production_data,
            atomic: self.atomic,
            log_level: self.log_level,
            ..DeletionConfig::default()
        }
    }

    fn parse_strategy(key: &str, default: DeletionStrategy) -> Result<DeletionStrategy> {
        let value = env::var(key).unwrap_or_else(|_| default.to_string());
        DeletionStrategy::from_str(&value).context(format!("Failed to parse {}", key))
    }

    fn parse_bool(key: &str, default: bool) -> Result<bool> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .to_lowercase()
            .parse::<bool>()
            .context(format!("Failed to parse {}", key))
    }
}
