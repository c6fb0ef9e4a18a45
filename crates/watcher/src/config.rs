//! Runtime configuration for the file watcher
//!
//! [`WatcherConfig`] is the watcher's own view of timing and capacity. The
//! binary derives it from the layered `fsreport_core::Config`; tests build it
//! directly with short durations.

use crate::tree::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable configuration for the file watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Quiet period before a pending write is reported (default: 5000ms)
    pub quiet_period_ms: u64,
    /// Interval between reaper scans (default: 5000ms)
    pub reap_interval_ms: u64,
    /// Spacing between dispatches within one scan (default: 300ms)
    pub dispatch_spacing_ms: u64,
    /// Registration attempts for directories that may not exist yet (default: 10)
    pub retry_attempts: u32,
    /// Delay before each registration attempt (default: 50ms)
    pub retry_delay_ms: u64,
    /// Maximum number of raw events buffered from the notifier (default: 100000)
    pub max_queue_size: usize,
    /// Treat plain data writes as settle signals (default: false)
    pub settle_on_modify: bool,
}

impl WatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> WatcherConfigBuilder {
        WatcherConfigBuilder::default()
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    pub fn dispatch_spacing(&self) -> Duration {
        Duration::from_millis(self.dispatch_spacing_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 5000,
            reap_interval_ms: 5000,
            dispatch_spacing_ms: 300,
            retry_attempts: 10,
            retry_delay_ms: 50,
            max_queue_size: 100000,
            settle_on_modify: false,
        }
    }
}

impl From<&fsreport_core::Config> for WatcherConfig {
    fn from(config: &fsreport_core::Config) -> Self {
        Self {
            quiet_period_ms: config.debounce.quiet_period_ms,
            reap_interval_ms: config.debounce.reap_interval_ms,
            dispatch_spacing_ms: config.debounce.dispatch_spacing_ms,
            retry_attempts: config.watch.retry_attempts,
            retry_delay_ms: config.watch.retry_delay_ms,
            max_queue_size: config.watch.event_queue_size,
            settle_on_modify: config.watch.settle_on_modify,
        }
    }
}

/// Builder for WatcherConfig
#[derive(Debug, Default)]
pub struct WatcherConfigBuilder {
    config: WatcherConfig,
}

impl WatcherConfigBuilder {
    pub fn quiet_period_ms(mut self, ms: u64) -> Self {
        self.config.quiet_period_ms = ms;
        self
    }

    pub fn reap_interval_ms(mut self, ms: u64) -> Self {
        self.config.reap_interval_ms = ms;
        self
    }

    pub fn dispatch_spacing_ms(mut self, ms: u64) -> Self {
        self.config.dispatch_spacing_ms = ms;
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.max_queue_size = size;
        self
    }

    pub fn settle_on_modify(mut self, enabled: bool) -> Self {
        self.config.settle_on_modify = enabled;
        self
    }

    pub fn build(self) -> WatcherConfig {
        self.config
    }
}
