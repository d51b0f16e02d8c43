//! Configuration management for followdiff
//!
//! This module provides configuration structures and defaults for the fetch
//! engine and the snapshot store. Values come from defaults, can be
//! overridden by environment variables, and finally by CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Global configuration for followdiff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Fetch engine configuration
    pub fetch: FetchConfig,
    /// Snapshot storage configuration
    pub storage: StorageConfig,
}

/// Configuration for the retrying fetch engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Pause between processed items in seconds
    pub delay_between_requests_secs: u64,
    /// Retry ceiling for rate-limited fetches
    pub max_retries: u32,
    /// Backoff base in seconds; retry n waits `retry_delay * (n + 1)`
    pub retry_delay_secs: u64,
    /// Emit a percentage update every this many processed items
    pub progress_interval: usize,
}

/// Configuration for snapshot persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory where snapshots and comparisons are written
    pub data_dir: PathBuf,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            delay_between_requests_secs: 5,
            max_retries: 5,
            retry_delay_secs: 10,
            progress_interval: 5,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl FetchConfig {
    /// Get the inter-item throttle duration
    pub fn delay_between_requests(&self) -> Duration {
        Duration::from_secs(self.delay_between_requests_secs)
    }

    /// Get the backoff duration for the given retry count
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        Duration::from_secs(self.retry_delay_secs * (u64::from(retry_count) + 1))
    }
}

/// Configuration loading and management
impl TrackerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FOLLOWDIFF_DELAY_BETWEEN_REQUESTS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.fetch.delay_between_requests_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("FOLLOWDIFF_MAX_RETRIES") {
            if let Ok(max) = val.parse::<u32>() {
                config.fetch.max_retries = max;
            }
        }

        if let Ok(val) = std::env::var("FOLLOWDIFF_RETRY_DELAY") {
            if let Ok(secs) = val.parse::<u64>() {
                config.fetch.retry_delay_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("FOLLOWDIFF_DATA_DIR") {
            if !val.is_empty() {
                config.storage.data_dir = PathBuf::from(val);
            }
        }

        config
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.fetch.progress_interval == 0 {
            return Err("progress_interval must be greater than 0".to_string());
        }

        if self.fetch.retry_delay_secs == 0 && self.fetch.max_retries > 0 {
            return Err("retry_delay must be greater than 0 when retries are enabled".to_string());
        }

        Ok(())
    }
}
