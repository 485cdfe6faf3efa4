//! Configuration management for Casebook.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `casebook.toml` file
//! 3. User config `~/.config/casebook/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote result reporting configuration.
    pub reporting: ReportingConfig,

    /// Case execution configuration.
    pub execution: ExecutionConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./casebook.toml` (project local)
    /// 2. `~/.config/casebook/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new(CONFIG_FILE_NAME).exists() {
            return Self::from_file(CONFIG_FILE_NAME);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(USER_CONFIG_DIR).join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("CASEBOOK_REPORTING_ENABLED") {
            if let Ok(b) = enabled.parse() {
                self.reporting.enabled = b;
            }
        }
        if let Ok(size) = std::env::var("CASEBOOK_BATCH_SIZE") {
            if let Ok(n) = size.parse() {
                self.reporting.batch_size = n;
            }
        }
        if let Ok(attempts) = std::env::var("CASEBOOK_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.reporting.max_attempts = n;
            }
        }
        if let Ok(secs) = std::env::var("CASEBOOK_RETRY_COOLDOWN_SECS") {
            if let Ok(n) = secs.parse() {
                self.reporting.retry_cooldown_secs = n;
            }
        }

        if let Ok(parallelism) = std::env::var("CASEBOOK_PARALLELISM") {
            if let Ok(n) = parallelism.parse() {
                self.execution.parallelism = n;
            }
        }
    }

    /// Rejects settings the pipeline and runner cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reporting.batch_size == 0 {
            return Err(ConfigError::Invalid("reporting.batch_size must be at least 1".into()));
        }
        if self.reporting.max_attempts == 0 {
            return Err(ConfigError::Invalid("reporting.max_attempts must be at least 1".into()));
        }
        if self.execution.parallelism == 0 {
            return Err(ConfigError::Invalid("execution.parallelism must be at least 1".into()));
        }
        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Remote result reporting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Report results remotely when a run client is available.
    pub enabled: bool,

    /// Results per submitted batch.
    pub batch_size: usize,

    /// Attempts per batch before remote reporting is suspended for the run.
    pub max_attempts: u32,

    /// Pause between failed attempts (in seconds).
    pub retry_cooldown_secs: u64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_cooldown_secs: DEFAULT_RETRY_COOLDOWN_SECS,
        }
    }
}

impl ReportingConfig {
    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_secs(self.retry_cooldown_secs)
    }
}

/// Case execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum number of cases invoked concurrently.
    pub parallelism: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}
