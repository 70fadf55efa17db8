//! Logging configuration parsing from environment variables.

use anyhow::Result;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            _ => anyhow::bail!("Invalid LOG_FORMAT: {}. Must be 'pretty' or 'compact'", s),
        }
    }
}

/// Logging environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingEnvConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence when set
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingEnvConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingEnvConfig {
    pub fn from_env() -> Result<Self> {
        let format_str = env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
        Ok(Self {
            filter: env::var("LOG_FILTER").unwrap_or_else(|_| "info".to_string()),
            format: LogFormat::from_str(&format_str)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::from_str("COMPACT").unwrap(), LogFormat::Compact);
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert!(LogFormat::from_str("json").is_err());
    }
}
