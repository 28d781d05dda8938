use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid budget capacity: {0}. Must be at least 1")]
    InvalidCapacity(u64),

    #[error("Invalid startup_overhead: {overhead}. Must be less than capacity ({capacity})")]
    OverheadExceedsCapacity { overhead: u64, capacity: u64 },

    #[error("Invalid threshold {name}: {value}. Must be in (0, 1]")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("Invalid thresholds: warning ({warning}) must not exceed critical ({critical})")]
    ThresholdOrder { warning: f64, critical: f64 },

    #[error("Invalid signal buffer_capacity: 0. Must be at least 1")]
    InvalidBufferCapacity,

    #[error("Invalid half_life_secs: {0}. Must be positive")]
    InvalidHalfLife(f64),

    #[error("Invalid decay_rate: {0}. Must be in (0, 1)")]
    InvalidDecayRate(f64),

    #[error("Invalid classification_margin: {0}. Must be in [0, 1)")]
    InvalidMargin(f64),

    #[error("Invalid min_confidence: {0}. Must be in [0, 1]")]
    InvalidMinConfidence(f64),

    #[error("Invalid cooldown_secs: {0}. Cannot be negative")]
    InvalidCooldown(i64),

    #[error("Invalid max_parallel: 0. Must be at least 1")]
    InvalidMaxParallel,

    #[error("Invalid task_timeout_secs: 0. Must be at least 1")]
    InvalidTaskTimeout,

    #[error("Invalid max_attempts: 0. Must be at least 1")]
    InvalidMaxAttempts,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .conductor/config.yaml (project config)
    /// 3. .conductor/local.yaml (local overrides, optional)
    /// 4. Environment variables (CONDUCTOR_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".conductor/config.yaml"))
            .merge(Yaml::file(".conductor/local.yaml"))
            .merge(Env::prefixed("CONDUCTOR_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment
    /// overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("CONDUCTOR_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let budget = &config.budget;
        if budget.capacity == 0 {
            return Err(ConfigError::InvalidCapacity(budget.capacity));
        }
        if budget.startup_overhead >= budget.capacity {
            return Err(ConfigError::OverheadExceedsCapacity {
                overhead: budget.startup_overhead,
                capacity: budget.capacity,
            });
        }
        for (name, value) in [
            ("warning_threshold", budget.warning_threshold),
            ("critical_threshold", budget.critical_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if budget.warning_threshold > budget.critical_threshold {
            return Err(ConfigError::ThresholdOrder {
                warning: budget.warning_threshold,
                critical: budget.critical_threshold,
            });
        }

        let signals = &config.signals;
        if signals.buffer_capacity == 0 {
            return Err(ConfigError::InvalidBufferCapacity);
        }
        if !(signals.half_life_secs > 0.0) {
            return Err(ConfigError::InvalidHalfLife(signals.half_life_secs));
        }
        if !(signals.decay_rate > 0.0 && signals.decay_rate < 1.0) {
            return Err(ConfigError::InvalidDecayRate(signals.decay_rate));
        }
        if !(0.0..1.0).contains(&signals.classification_margin) {
            return Err(ConfigError::InvalidMargin(signals.classification_margin));
        }

        if !(0.0..=1.0).contains(&config.policy.min_confidence) {
            return Err(ConfigError::InvalidMinConfidence(config.policy.min_confidence));
        }
        if config.policy.cooldown_secs < 0 {
            return Err(ConfigError::InvalidCooldown(config.policy.cooldown_secs));
        }

        let scheduler = &config.scheduler;
        if scheduler.max_parallel == 0 {
            return Err(ConfigError::InvalidMaxParallel);
        }
        if scheduler.task_timeout_secs == 0 {
            return Err(ConfigError::InvalidTaskTimeout);
        }
        if scheduler.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}
