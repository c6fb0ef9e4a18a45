//! Default values and functions for configuration

use std::path::PathBuf;

// Default constants
pub(crate) const DEFAULT_CONFIG_FILE: &str = "fsreport.toml";
pub(crate) const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:80/smb_active";
pub(crate) const DEFAULT_PREFIX_FILE: &str = "prefix.txt";
pub(crate) const DEFAULT_SUFFIX_FILE: &str = "suffix.txt";
pub(crate) const DEFAULT_REGEX_FILE: &str = "reg.txt";

/// Watch root relative to the working directory when nothing else is configured
pub(crate) fn default_watch_root() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    cwd.join("knowledge_base").join("smb")
}

pub(crate) fn default_retry_attempts() -> u32 {
    10
}

pub(crate) fn default_retry_delay_ms() -> u64 {
    50
}

pub(crate) fn default_event_queue_size() -> usize {
    100_000 // Large enough to absorb bulk copies into the tree
}

pub(crate) fn default_settle_on_modify() -> bool {
    false
}

pub(crate) fn default_prefix_file() -> PathBuf {
    PathBuf::from(DEFAULT_PREFIX_FILE)
}

pub(crate) fn default_suffix_file() -> PathBuf {
    PathBuf::from(DEFAULT_SUFFIX_FILE)
}

pub(crate) fn default_regex_file() -> PathBuf {
    PathBuf::from(DEFAULT_REGEX_FILE)
}

pub(crate) fn default_quiet_period_ms() -> u64 {
    5_000
}

pub(crate) fn default_reap_interval_ms() -> u64 {
    5_000
}

pub(crate) fn default_dispatch_spacing_ms() -> u64 {
    300
}

pub(crate) fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

pub(crate) fn default_delivery_timeout_secs() -> u64 {
    20
}

pub(crate) fn default_accept_invalid_certs() -> bool {
    true
}

pub(crate) fn default_delivery_queue_capacity() -> usize {
    10_000
}

pub(crate) fn default_max_concurrent_deliveries() -> usize {
    16
}
