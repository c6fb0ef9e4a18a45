//! Configuration module for fsreport
//!
//! Configuration is layered: built-in defaults, an optional TOML file,
//! `FSREPORT_*` environment variables, and finally command-line overrides
//! applied by the binary.

mod defaults;
mod loading;

#[cfg(test)]
mod tests;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use defaults::*;

/// Returns the path of the configuration file used when none is given
///
/// Resolved against the working directory, next to the exclusion rule files.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Watch tree configuration
    #[serde(default)]
    pub watch: WatchConfig,

    /// Exclusion rule sources
    #[serde(default)]
    pub exclusions: ExclusionConfig,

    /// Debounce and reaper timing
    #[serde(default)]
    pub debounce: DebounceConfig,

    /// Delivery endpoint configuration
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// Configuration for the watched directory tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Root directory to watch recursively
    #[serde(default = "default_watch_root")]
    pub root: PathBuf,

    /// Attempts made when registering a directory that may not exist yet
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay before each registration attempt in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Capacity of the channel between the OS notifier and the event loop
    #[serde(default = "default_event_queue_size")]
    pub event_queue_size: usize,

    /// Treat plain data writes as settle signals (for platforms without close-write)
    #[serde(default = "default_settle_on_modify")]
    pub settle_on_modify: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: default_watch_root(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            event_queue_size: default_event_queue_size(),
            settle_on_modify: default_settle_on_modify(),
        }
    }
}

/// Locations of the three line-oriented exclusion rule files
///
/// A missing file means an empty rule set for that kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionConfig {
    /// Basename prefixes, one per line
    #[serde(default = "default_prefix_file")]
    pub prefix_file: PathBuf,

    /// Basename suffixes, one per line
    #[serde(default = "default_suffix_file")]
    pub suffix_file: PathBuf,

    /// Regular expressions matched against the full path, one per line
    #[serde(default = "default_regex_file")]
    pub regex_file: PathBuf,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            prefix_file: default_prefix_file(),
            suffix_file: default_suffix_file(),
            regex_file: default_regex_file(),
        }
    }
}

/// Debounce timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Quiet period after the last write before it is reported
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,

    /// Interval between reaper scans
    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,

    /// Spacing between dispatches of due entries within one scan
    #[serde(default = "default_dispatch_spacing_ms")]
    pub dispatch_spacing_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: default_quiet_period_ms(),
            reap_interval_ms: default_reap_interval_ms(),
            dispatch_spacing_ms: default_dispatch_spacing_ms(),
        }
    }
}

/// Configuration for the HTTP reporting endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// URL events are POSTed to
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_delivery_timeout_secs")]
    pub timeout_secs: u64,

    /// Skip TLS certificate verification (the endpoint is usually self-signed)
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,

    /// Events buffered for delivery before new ones are dropped
    #[serde(default = "default_delivery_queue_capacity")]
    pub queue_capacity: usize,

    /// Maximum deliveries in flight at once
    #[serde(default = "default_max_concurrent_deliveries")]
    pub max_concurrent: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_delivery_timeout_secs(),
            accept_invalid_certs: default_accept_invalid_certs(),
            queue_capacity: default_delivery_queue_capacity(),
            max_concurrent: default_max_concurrent_deliveries(),
        }
    }
}

impl Config {
    /// Applies command-line overrides on top of the loaded configuration
    pub fn with_overrides(mut self, root: Option<PathBuf>, endpoint: Option<String>) -> Self {
        if let Some(root) = root {
            self.watch.root = root;
        }
        if let Some(endpoint) = endpoint {
            self.delivery.endpoint = endpoint;
        }
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.delivery.endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::config("delivery.endpoint cannot be empty".to_string()));
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(Error::config(format!(
                "Invalid delivery.endpoint '{endpoint}': must start with http:// or https://"
            )));
        }

        if self.watch.root.as_os_str().is_empty() {
            return Err(Error::config("watch.root cannot be empty".to_string()));
        }

        if self.watch.retry_attempts == 0 {
            return Err(Error::config(
                "watch.retry_attempts must be greater than 0".to_string(),
            ));
        }

        if self.watch.event_queue_size == 0 {
            return Err(Error::config(
                "watch.event_queue_size must be greater than 0".to_string(),
            ));
        }

        if self.debounce.reap_interval_ms == 0 {
            return Err(Error::config(
                "debounce.reap_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.delivery.queue_capacity == 0 {
            return Err(Error::config(
                "delivery.queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.delivery.max_concurrent == 0 {
            return Err(Error::config(
                "delivery.max_concurrent must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
