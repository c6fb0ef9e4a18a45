//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;
use tracing::debug;

use super::defaults::*;
use super::{default_config_path, Config};

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `FSREPORT_` and use double underscores
    /// for nested values. For example:
    /// - `FSREPORT_DELIVERY__ENDPOINT=https://reports.internal/smb_active`
    /// - `FSREPORT_DEBOUNCE__QUIET_PERIOD_MS=2000`
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        let builder = set_config_default(
            builder,
            "watch.root",
            default_watch_root().to_string_lossy().to_string(),
        )?;
        let builder = set_config_default(builder, "delivery.endpoint", default_endpoint())?;
        let builder = set_config_default(
            builder,
            "debounce.quiet_period_ms",
            default_quiet_period_ms() as i64,
        )?;
        let mut builder = set_config_default(
            builder,
            "debounce.reap_interval_ms",
            default_reap_interval_ms() as i64,
        )?;

        // Add the config file if it exists
        if path.exists() {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path));
        } else {
            debug!("No configuration file at {}, using defaults", path.display());
        }

        builder = builder.add_source(
            Environment::with_prefix("FSREPORT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (`./fsreport.toml` or custom --config path)
    /// 3. Environment variables (FSREPORT_*)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => {
                if !p.exists() {
                    return Err(Error::config(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                p.to_path_buf()
            }
            None => default_config_path(),
        };
        Self::from_file(&path)
    }
}
