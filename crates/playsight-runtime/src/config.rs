//! Runtime configuration.
//!
//! Loaded from YAML or JSON. Every field has a default, so an empty document
//! is a valid configuration. Durations are human-readable strings
//! (`"15m"`, `"30s"`, `"24h"`).
//!
//! ```yaml
//! cache:
//!   default_ttl: 60m
//!   max_entries: 1000
//!   sweep_interval: 15m
//! ledger:
//!   daily_limit: 10.0
//! orchestrator:
//!   request_timeout: 30s
//! backends:
//!   - id: primary
//!     priority: 1
//!     default_model: scorer-large
//!     pricing:
//!       scorer-large: { input_per_k: 0.003, output_per_k: 0.015 }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::providers::BackendDescriptor;
use crate::resilience::CircuitBreakerConfig;

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub cache: CacheConfig,
    pub ledger: LedgerConfig,
    pub orchestrator: OrchestratorConfig,
    pub backends: Vec<BackendDescriptor>,
}

/// Cache store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL before confidence and source multipliers
    #[serde(with = "duration_str")]
    pub default_ttl: Duration,

    pub max_entries: usize,

    /// Upper bound on the summed serialized size of all payloads
    pub max_bytes: usize,

    /// How often the service sweeps expired entries
    #[serde(with = "duration_str")]
    pub sweep_interval: Duration,

    /// Where snapshots are written; no persistence when unset
    pub snapshot_path: Option<PathBuf>,

    /// Snapshots older than this are discarded on load
    #[serde(with = "duration_str")]
    pub snapshot_max_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60 * 60),
            max_entries: 1000,
            max_bytes: 10 * 1024 * 1024,
            sweep_interval: Duration::from_secs(15 * 60),
            snapshot_path: None,
            snapshot_max_age: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl CacheConfig {
    /// Default TTL in whole minutes, at least one.
    pub fn default_ttl_minutes(&self) -> u64 {
        (self.default_ttl.as_secs() / 60).max(1)
    }
}

/// Rate and cost ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Daily spend shared by every backend (same currency as pricing)
    pub daily_limit: f64,

    /// Applied to backends without a descriptor
    pub default_requests_per_minute: u32,

    pub default_tokens_per_minute: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            daily_limit: 10.0,
            default_requests_per_minute: 60,
            default_tokens_per_minute: 100_000,
        }
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Per-backend call timeout
    #[serde(with = "duration_str")]
    pub request_timeout: Duration,

    pub max_tokens: u32,

    pub temperature: f32,

    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_tokens: 1500,
            temperature: 0.3,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file; `.json` is JSON, anything else YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Reject configurations the runtime cannot operate under.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid("cache.max_entries must be > 0".to_string()));
        }
        if self.cache.max_bytes == 0 {
            return Err(ConfigError::Invalid("cache.max_bytes must be > 0".to_string()));
        }
        if self.cache.default_ttl < Duration::from_secs(60) {
            return Err(ConfigError::Invalid(
                "cache.default_ttl must be at least one minute".to_string(),
            ));
        }
        if self.cache.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid("cache.sweep_interval must be > 0".to_string()));
        }
        if !(self.ledger.daily_limit.is_finite() && self.ledger.daily_limit >= 0.0) {
            return Err(ConfigError::Invalid(
                "ledger.daily_limit must be a non-negative number".to_string(),
            ));
        }
        if self.ledger.default_requests_per_minute == 0 || self.ledger.default_tokens_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "ledger default rate limits must be > 0".to_string(),
            ));
        }
        if self.orchestrator.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "orchestrator.request_timeout must be > 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            if backend.id.trim().is_empty() {
                return Err(ConfigError::Invalid("backend id must not be empty".to_string()));
            }
            if backend.id == playsight_core::LOCAL_BACKEND {
                return Err(ConfigError::Invalid(format!(
                    "backend id '{}' is reserved",
                    backend.id
                )));
            }
            if !seen.insert(backend.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate backend id: {}",
                    backend.id
                )));
            }
            if backend.requests_per_minute == 0 || backend.tokens_per_minute == 0 {
                return Err(ConfigError::Invalid(format!(
                    "backend {} has a zero rate limit",
                    backend.id
                )));
            }
        }

        Ok(())
    }
}

/// Serde adapter for human-readable durations ("90s", "15m", "1h 30m").
pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
