//! Common utilities and types shared across regionmeta

pub mod config;
pub mod error;
pub mod utils;

pub use config::{Config, MasterConfig, RetryConfig};
pub use error::{Error, Result};
pub use utils::{backoff_delay, display_key, parse_duration, timestamp_now_millis};
