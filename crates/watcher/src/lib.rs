#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Directory tree watching with debounced change reporting
//!
//! This crate turns raw filesystem notifications into settled, logical
//! changes and ships them to a sink:
//! - Exclusion of temporary files by prefix, suffix and regex rules
//! - Recursive watch registration that follows new subdirectories
//! - Per-path write debouncing with a periodic reaper
//! - Fire-and-forget delivery over HTTP
//!
//! # Example
//!
//! ```no_run
//! use fsreport_watcher::{Dispatcher, ExclusionMatcher, FileWatcher, HttpSink, WatcherConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sink = HttpSink::new("http://127.0.0.1:80/smb_active", Duration::from_secs(20), true)?;
//! let (dispatcher, _worker) = Dispatcher::spawn(Arc::new(sink), 10_000, 16);
//!
//! let matcher = ExclusionMatcher::builder().prefix("~$").suffix(".tmp").build()?;
//! let mut watcher = FileWatcher::new(WatcherConfig::default(), Arc::new(matcher), dispatcher);
//! watcher.watch("/srv/share").await?;
//!
//! tokio::signal::ctrl_c().await?;
//! watcher.stop().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod debouncer;
mod events;
mod exclude;
mod reaper;
mod sink;
mod tree;
mod watcher;

pub use config::{WatcherConfig, WatcherConfigBuilder};
pub use debouncer::{Classification, EventClassifier, PendingEntry, PendingTable};
pub use events::{EventPayload, LogicalEvent, LogicalEventKind, Ops, RawEvent};
pub use exclude::{read_rule_lines, ExclusionMatcher, ExclusionMatcherBuilder, ExclusionRule};
pub use reaper::Reaper;
pub use sink::{Dispatcher, EventSink, HttpSink};
pub use tree::{subdirectories, NotifyRegistry, RetryPolicy, WatchError, WatchRegistry, WatchTree};
pub use watcher::{EventProcessor, FileWatcher};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::events::{LogicalEvent, LogicalEventKind};
    pub use crate::exclude::ExclusionMatcher;
    pub use crate::sink::{Dispatcher, EventSink, HttpSink};
    pub use crate::watcher::FileWatcher;
    pub use crate::WatcherConfig;
}
