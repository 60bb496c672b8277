//! Configuration for the regionmeta master

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Default config file name, looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "regionmeta";

/// Environment variable prefix, e.g. `REGIONMETA__MASTER__WORKERS=8`
const ENV_PREFIX: &str = "REGIONMETA";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Master-specific config
    pub master: MasterConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            master: MasterConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (or `./regionmeta.toml` if present),
    /// then apply `REGIONMETA__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(::config::File::from(path).required(true)),
            None => {
                builder.add_source(::config::File::with_name(DEFAULT_CONFIG_FILE).required(false))
            }
        };
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.master.validate()?;
        Ok(config)
    }
}

/// Master configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Bind address for the admin HTTP API
    pub bind_addr: SocketAddr,

    /// Number of event-processing workers
    pub workers: usize,

    /// Delay before an event deferred on an unreachable meta region is retried
    pub requeue_delay_ms: u64,

    /// Capacity of the meta-region scan queue
    pub scan_queue_capacity: usize,

    /// Number of meta regions the initial scan waits for
    pub expected_meta_regions: usize,

    /// Retry policy for meta store operations
    pub retry: RetryConfig,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 60010)),
            workers: 4,
            requeue_delay_ms: 1_000,
            scan_queue_capacity: 64,
            expected_meta_regions: 1,
            retry: RetryConfig::default(),
        }
    }
}

impl MasterConfig {
    pub fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.requeue_delay_ms)
    }

    pub fn set_requeue_delay(&mut self, delay: Duration) -> Result<()> {
        self.requeue_delay_ms = u64::try_from(delay.as_millis()).map_err(|_| {
            Error::InvalidConfig(format!("requeue delay out of range: {:?}", delay))
        })?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".into()));
        }
        if self.scan_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "scan_queue_capacity must be at least 1".into(),
            ));
        }
        self.retry.validate()
    }
}

/// Retry policy for meta store operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: usize,

    /// Backoff before the second attempt; doubles per attempt
    pub initial_backoff_ms: u64,

    /// Upper bound on a single backoff
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(Error::InvalidConfig(
                "retry.max_backoff_ms is smaller than retry.initial_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}
