//! Core types for fsreport
//!
//! This crate provides the foundations shared by the watcher and the binary:
//!
//! - **Configuration**: layered TOML/environment configuration
//! - **Error handling**: unified error type

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::{Config, DebounceConfig, DeliveryConfig, ExclusionConfig, WatchConfig};
pub use error::{Error, Result};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
