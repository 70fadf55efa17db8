//! Configuration module for Tradelens.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Persistence, Deletion and Logging.

mod deletion_config;
mod logging_config;

pub use deletion_config::DeletionEnvConfig;
pub use logging_config::{LogFormat, LoggingEnvConfig};

use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://tradelens.db";

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub deletion: DeletionEnvConfig,
    pub logging: LoggingEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing variables fall back to defaults; malformed ones are errors.
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let deletion = DeletionEnvConfig::from_env().context("Failed to load deletion config")?;
        let logging = LoggingEnvConfig::from_env().context("Failed to load logging config")?;

        Ok(Self {
            database_url,
            deletion,
            logging,
        })
    }
}
