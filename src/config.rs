//! Engine configuration
//!
//! Tunables are read from an optional TOML file; every field may be
//! omitted. Command-line flags are applied on top by the CLI layer, and
//! [`EngineConfig::normalized`] replaces unusable values with defaults.
//!
//! ```toml
//! runner_capacity = 10
//! bus_capacity = 512
//! worker_threads = 8
//! stop_timeout_ms = 5000
//!
//! [consumer]
//! workers = 4
//! max_retries = 3
//! base_backoff_ms = 200
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::core::ConsumerConfig;
use crate::types::StatementError;

pub const DEFAULT_RUNNER_CAPACITY: usize = 10;
pub const DEFAULT_BUS_CAPACITY: usize = 512;
pub const DEFAULT_CONSUMER_WORKERS: usize = 4;
pub const DEFAULT_MAX_RETRIES: i64 = 3;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 200;
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5000;

/// Reconciliation consumer settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumerSettings {
    pub workers: usize,

    /// Retries after the first attempt; negative means none
    pub max_retries: i64,

    pub base_backoff_ms: u64,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_CONSUMER_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
        }
    }
}

/// All tunables of the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum number of uploads decoded concurrently
    pub runner_capacity: usize,

    /// Undelivered failed-transaction events held before publishers wait
    pub bus_capacity: usize,

    /// Tokio runtime worker threads (default: CPU cores)
    pub worker_threads: usize,

    /// How long shutdown waits for the consumer to drain
    pub stop_timeout_ms: u64,

    pub consumer: ConsumerSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            runner_capacity: DEFAULT_RUNNER_CAPACITY,
            bus_capacity: DEFAULT_BUS_CAPACITY,
            worker_threads: num_cpus::get(),
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            consumer: ConsumerSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Read a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, StatementError> {
        let raw = fs::read_to_string(path).map_err(|e| StatementError::ConfigError {
            message: format!("failed to read '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&raw).map_err(|e| StatementError::ConfigError {
            message: format!("'{}': {}", path.display(), e),
        })
    }

    /// Parse TOML configuration text
    pub fn from_toml_str(raw: &str) -> Result<Self, StatementError> {
        toml::from_str(raw).map_err(|e| StatementError::ConfigError {
            message: e.to_string(),
        })
    }

    /// Replace unusable values with defaults, warning about each
    pub fn normalized(self) -> Self {
        let defaults = EngineConfig::default();

        Self {
            runner_capacity: or_default("runner_capacity", self.runner_capacity, defaults.runner_capacity),
            bus_capacity: or_default("bus_capacity", self.bus_capacity, defaults.bus_capacity),
            worker_threads: or_default("worker_threads", self.worker_threads, defaults.worker_threads),
            stop_timeout_ms: or_default(
                "stop_timeout_ms",
                self.stop_timeout_ms,
                defaults.stop_timeout_ms,
            ),
            consumer: ConsumerSettings {
                workers: or_default(
                    "consumer.workers",
                    self.consumer.workers,
                    defaults.consumer.workers,
                ),
                max_retries: if self.consumer.max_retries < 0 {
                    warn!(
                        value = self.consumer.max_retries,
                        "negative consumer.max_retries, retries disabled"
                    );
                    0
                } else {
                    self.consumer.max_retries
                },
                base_backoff_ms: or_default(
                    "consumer.base_backoff_ms",
                    self.consumer.base_backoff_ms,
                    defaults.consumer.base_backoff_ms,
                ),
            },
        }
    }

    /// Settings for the reconciliation consumer
    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            workers: self.consumer.workers,
            max_retries: u32::try_from(self.consumer.max_retries.max(0)).unwrap_or(u32::MAX),
            base_backoff: Duration::from_millis(self.consumer.base_backoff_ms),
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

fn or_default<T>(field: &str, value: T, default: T) -> T
where
    T: PartialEq + Default + std::fmt::Display + Copy,
{
    if value == T::default() {
        warn!(field, value = %value, default = %default, "invalid configuration value, using default");
        default
    } else {
        value
    }
}
