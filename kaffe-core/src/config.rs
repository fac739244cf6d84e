//! Configuration for collectors and test runs

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceError};

/// Seed used for random crash scenarios when none is configured
pub const DEFAULT_SEED: u64 = 42;

/// Where trace points go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitMode {
    /// Record into a collector (test builds)
    #[default]
    Collect,
    /// Degrade to a leveled log line
    Log,
}

/// Collector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Emission mode selected at startup
    #[serde(default)]
    pub mode: EmitMode,

    /// Quiescence interval used by `collect_default()`
    #[serde(default)]
    pub quiescence_timeout_ms: u64,

    /// Seed for random crash scenarios
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 { DEFAULT_SEED }

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            mode: EmitMode::Collect,
            quiescence_timeout_ms: 0,
            seed: DEFAULT_SEED,
        }
    }
}

impl CollectorConfig {
    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TraceError::ConfigurationError {
            reason: format!("invalid collector config: {}", e),
        })
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        tracing::debug!(path = %path.display(), ?config, "loaded collector config");
        Ok(config)
    }

    pub fn quiescence_timeout(&self) -> Duration {
        Duration::from_millis(self.quiescence_timeout_ms)
    }
}

/// Options for one run/check cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Quiescence wait before the trace is collected
    #[serde(default)]
    pub timeout_ms: u64,

    /// Grouping key attached to log records of this run
    #[serde(default)]
    pub bucket: Option<String>,
}

impl RunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = CollectorConfig::from_json("{}").unwrap();
        assert_eq!(config, CollectorConfig::default());
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.quiescence_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_parse_collector_config() {
        let config = CollectorConfig::from_json(
            r#"{"mode": "log", "quiescence_timeout_ms": 250, "seed": 7}"#,
        )
        .unwrap();
        assert_eq!(config.mode, EmitMode::Log);
        assert_eq!(config.quiescence_timeout(), Duration::from_millis(250));
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn test_invalid_config() {
        let err = CollectorConfig::from_json(r#"{"mode": "shout"}"#).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_run_config() {
        let config: RunConfig =
            serde_json::from_str(r#"{"timeout_ms": 100, "bucket": "n=10"}"#).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(100));
        assert_eq!(config.bucket.as_deref(), Some("n=10"));
    }
}
