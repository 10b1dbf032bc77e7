//! `TierCache` Configuration Module
//!
//! Provides configuration file support via `tiercache.toml`, environment
//! variables, and runtime overrides.
//!
//! # Priority (highest to lowest)
//!
//! 1. Runtime overrides (builder methods, CLI flags)
//! 2. Environment variables (`TIERCACHE_<SECTION>__<KEY>`)
//! 3. Configuration file (`tiercache.toml`)
//! 4. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration file.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

/// Core cache policy section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicyConfig {
    /// Maximum number of live entries before eviction kicks in.
    pub max_memory_entries: usize,
    /// Hits needed before an entry is promoted one tier.
    pub promotion_threshold: u64,
    /// Idle seconds after which a maintenance pass demotes an entry one tier.
    pub demotion_idle_secs: u64,
    /// TTL applied to `set` calls that don't specify one (`None` = no expiry).
    pub default_ttl_secs: Option<u64>,
}

impl Default for CachePolicyConfig {
    fn default() -> Self {
        Self {
            max_memory_entries: 1000,
            promotion_threshold: 5,
            demotion_idle_secs: 3600,
            default_ttl_secs: None,
        }
    }
}

/// Maintenance loop section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Seconds between maintenance passes.
    pub interval_secs: u64,
    /// Spawn the maintenance loop on `initialize()`.
    pub enabled: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            enabled: true,
        }
    }
}

/// Warming subsystem section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmingConfig {
    /// Bound of the warming queue; `warm_cache` waits when it is full.
    pub queue_capacity: usize,
    /// Spawn the warming consumer on `initialize()`.
    pub enabled: bool,
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            enabled: true,
        }
    }
}

/// Stats and performance reporting section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Maximum number of hot/cold keys sampled in `get_stats()`.
    pub sample_size: usize,
    /// Number of recent operations kept for the performance report.
    pub performance_window: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            sample_size: 10,
            performance_window: 100,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,
    /// Log format: text or json.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Main `TierCache` configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TierCacheConfig {
    /// Cache policy configuration.
    pub cache: CachePolicyConfig,
    /// Maintenance loop configuration.
    pub maintenance: MaintenanceConfig,
    /// Warming configuration.
    pub warming: WarmingConfig,
    /// Stats configuration.
    pub stats: StatsConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl TierCacheConfig {
    /// Loads configuration from default sources.
    ///
    /// Priority: defaults < file < environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("tiercache.toml")
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("TIERCACHE_").split("__"));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let at_least_one = [
            ("cache.max_memory_entries", self.cache.max_memory_entries as u64),
            ("cache.promotion_threshold", self.cache.promotion_threshold),
            ("maintenance.interval_secs", self.maintenance.interval_secs),
            ("warming.queue_capacity", self.warming.queue_capacity as u64),
            ("stats.sample_size", self.stats.sample_size as u64),
            ("stats.performance_window", self.stats.performance_window as u64),
        ];
        for (key, value) in at_least_one {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "value must be >= 1".to_string(),
                });
            }
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                message: format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                message: format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        Ok(())
    }

    /// Idle time after which an entry becomes eligible for demotion.
    #[must_use]
    pub fn demotion_idle(&self) -> Duration {
        Duration::from_secs(self.cache.demotion_idle_secs)
    }

    /// Interval between maintenance passes.
    #[must_use]
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance.interval_secs)
    }

    /// TTL applied when `set` is called without one.
    #[must_use]
    pub fn default_ttl(&self) -> Option<Duration> {
        self.cache.default_ttl_secs.map(Duration::from_secs)
    }

    /// Sets the maximum number of entries.
    #[must_use]
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.cache.max_memory_entries = max;
        self
    }

    /// Sets the promotion threshold.
    #[must_use]
    pub fn with_promotion_threshold(mut self, threshold: u64) -> Self {
        self.cache.promotion_threshold = threshold;
        self
    }

    /// Sets the demotion idle time in seconds.
    #[must_use]
    pub fn with_demotion_idle_secs(mut self, secs: u64) -> Self {
        self.cache.demotion_idle_secs = secs;
        self
    }

    /// Sets the maintenance interval in seconds.
    #[must_use]
    pub fn with_maintenance_interval_secs(mut self, secs: u64) -> Self {
        self.maintenance.interval_secs = secs;
        self
    }

    /// Sets the warming queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.warming.queue_capacity = capacity;
        self
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
