//! Runtime configuration, read from TOML.
//!
//! ```toml
//! mode = "adopt"
//! store_buffer = 64
//! workers = 4
//!
//! [retry]
//! base_delay_ms = 100
//! max_delay_ms = 30000
//! max_attempts = 0   # retry forever
//! ```
//!
//! Every field is optional.

use crate::queue::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Which reconciler drives the work queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Bidirectional mirroring with ownership arbitration.
    #[default]
    Sync,
    /// One-way claiming of provider-side resources.
    Adopt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub mode: Mode,
    /// Request buffer of each store actor.
    pub store_buffer: usize,
    /// Passes allowed to run at once.
    pub workers: usize,
    pub retry: RetryConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            store_buffer: 64,
            workers: 4,
            retry: RetryConfig::default(),
        }
    }
}

impl MirrorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Validation("workers must be at least 1".into()));
        }
        if self.store_buffer == 0 {
            return Err(ConfigError::Validation("store_buffer must be at least 1".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Validation(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// `0` retries forever.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 30_000,
            max_attempts: 0,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Validation(String),
}
