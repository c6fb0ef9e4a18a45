//! Watch-tree management
//!
//! The OS watch primitive is used non-recursively; this module owns the
//! recursion. Every directory under the root gets its own registration, and
//! directories that appear later are registered as their creation events
//! arrive.

use dashmap::DashSet;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Registration failures for a single directory
#[derive(Debug, Error)]
pub enum WatchError {
    /// The directory never appeared within the retry budget
    #[error("{} does not exist after {attempts} attempts", .path.display())]
    NotFound { path: PathBuf, attempts: u32 },

    /// The notification source refused the registration
    #[error("Failed to watch {}: {source}", .path.display())]
    Registration {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

impl From<WatchError> for fsreport_core::Error {
    fn from(err: WatchError) -> Self {
        fsreport_core::Error::with_context("Watch registration failed", err)
    }
}

/// Something directories can be registered with
pub trait WatchRegistry: Send + Sync {
    /// Register a single directory, non-recursively
    fn register(&self, dir: &Path) -> Result<(), notify::Error>;
}

/// [`WatchRegistry`] backed by the platform's recommended notify watcher
pub struct NotifyRegistry {
    watcher: Mutex<RecommendedWatcher>,
}

impl NotifyRegistry {
    pub fn new(watcher: RecommendedWatcher) -> Self {
        Self {
            watcher: Mutex::new(watcher),
        }
    }
}

impl WatchRegistry for NotifyRegistry {
    fn register(&self, dir: &Path) -> Result<(), notify::Error> {
        let mut watcher = self
            .watcher
            .lock()
            .map_err(|_| notify::Error::generic("watcher lock poisoned"))?;
        watcher.watch(dir, RecursiveMode::NonRecursive)
    }
}

/// Bounded retry for directories that may not exist yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Slept before every attempt, including the first
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(50),
        }
    }
}

/// The set of registered directories mirroring the watched hierarchy
pub struct WatchTree {
    registry: Arc<dyn WatchRegistry>,
    watched: Arc<DashSet<PathBuf>>,
    retry: RetryPolicy,
}

impl WatchTree {
    pub fn new(registry: Arc<dyn WatchRegistry>, retry: RetryPolicy) -> Self {
        Self {
            registry,
            watched: Arc::new(DashSet::new()),
            retry,
        }
    }

    /// Register one directory, waiting for it to appear
    ///
    /// Each attempt sleeps first, then checks for existence. A missing path
    /// uses up the attempt. Once the path exists registration is tried
    /// exactly once and its outcome returned.
    pub async fn add_watch(&self, dir: &Path) -> Result<(), WatchError> {
        for attempt in 1..=self.retry.attempts {
            sleep(self.retry.delay).await;

            match tokio::fs::metadata(dir).await {
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    trace!(
                        "{} not present yet (attempt {}/{})",
                        dir.display(),
                        attempt,
                        self.retry.attempts
                    );
                }
                _ => return self.register_once(dir),
            }
        }

        Err(WatchError::NotFound {
            path: dir.to_path_buf(),
            attempts: self.retry.attempts,
        })
    }

    /// Register `root` with retry, then every directory beneath it
    ///
    /// The walk and the registrations below the root run on the blocking
    /// pool. Failures below the root are logged and skipped. Returns the
    /// number of subdirectories registered.
    pub async fn add_tree(&self, root: &Path) -> Result<usize, WatchError> {
        self.add_watch(root).await?;

        let registry = Arc::clone(&self.registry);
        let watched = Arc::clone(&self.watched);
        let walk_root = root.to_path_buf();
        let walk = tokio::task::spawn_blocking(move || {
            let mut registered = 0;
            for dir in subdirectories(&walk_root) {
                match register(registry.as_ref(), &watched, &dir) {
                    Ok(()) => registered += 1,
                    Err(e) => warn!("{}", e),
                }
            }
            registered
        });
        let registered = match walk.await {
            Ok(registered) => registered,
            Err(e) => {
                warn!("Directory walk under {} failed: {}", root.display(), e);
                return Ok(0);
            }
        };

        debug!(
            "Registered {} and {} subdirectories",
            root.display(),
            registered
        );
        Ok(registered)
    }

    /// Register a newly discovered subtree on its own task
    pub fn spawn_add_tree(self: &Arc<Self>, dir: PathBuf) -> JoinHandle<()> {
        let tree = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = tree.add_tree(&dir).await {
                warn!("{}", e);
            }
        })
    }

    /// Drop `path` and everything registered beneath it
    ///
    /// Returns how many registrations were forgotten.
    pub fn forget(&self, path: &Path) -> usize {
        let before = self.watched.len();
        self.watched.retain(|p| !p.starts_with(path));
        let removed = before.saturating_sub(self.watched.len());
        if removed > 0 {
            debug!("Forgot {} watched directories under {}", removed, path.display());
        }
        removed
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.watched.contains(path)
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.watched.iter().map(|p| p.key().clone()).collect();
        paths.sort();
        paths
    }

    fn register_once(&self, dir: &Path) -> Result<(), WatchError> {
        register(self.registry.as_ref(), &self.watched, dir)
    }
}

/// Register `dir` unless it is already in `watched`
fn register(
    registry: &dyn WatchRegistry,
    watched: &DashSet<PathBuf>,
    dir: &Path,
) -> Result<(), WatchError> {
    if !watched.insert(dir.to_path_buf()) {
        trace!("{} already watched", dir.display());
        return Ok(());
    }

    if let Err(source) = registry.register(dir) {
        watched.remove(dir);
        return Err(WatchError::Registration {
            path: dir.to_path_buf(),
            source,
        });
    }

    debug!("Watching {}", dir.display());
    Ok(())
}

/// Every directory strictly below `root`
///
/// Entries that cannot be read are logged and skipped.
pub fn subdirectories(root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        match entry {
            Ok(entry) if entry.file_type().is_dir() => dirs.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry under {}: {}", root.display(), e),
        }
    }
    dirs
}
