//! Event classification and write debouncing
//!
//! Settle signals (close-after-write) are not reported directly. They
//! refresh a per-path entry in the [`PendingTable`], and the reaper reports
//! the write once the path has been quiet long enough. Removes and moves are
//! reported immediately.

use crate::events::{LogicalEvent, Ops, RawEvent};
use crate::exclude::ExclusionMatcher;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, trace};

/// A write waiting for its path to go quiet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub path: PathBuf,
    /// Monotonic time of the latest settle signal
    pub last_seen: Instant,
    /// Wall-clock time of the latest settle signal
    pub observed_at: SystemTime,
    /// Settle signals coalesced into this entry
    pub occurrences: u32,
}

impl PendingEntry {
    fn new(path: PathBuf, now: Instant, wall: SystemTime) -> Self {
        Self {
            path,
            last_seen: now,
            observed_at: wall,
            occurrences: 1,
        }
    }

    fn refresh(&mut self, now: Instant, wall: SystemTime) {
        self.last_seen = now;
        self.observed_at = wall;
        self.occurrences = self.occurrences.saturating_add(1);
    }

    /// Whether the entry has been quiet for strictly longer than `quiet`
    pub fn is_due(&self, quiet: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) > quiet
    }

    /// The write event this entry turns into when flushed
    pub fn to_event(&self) -> LogicalEvent {
        LogicalEvent::write(self.path.clone(), self.observed_at)
    }
}

/// Pending writes keyed by path, at most one per path
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: DashMap<PathBuf, PendingEntry>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a settle signal for `path` now
    pub fn upsert(&self, path: PathBuf) -> u32 {
        self.upsert_at(path, Instant::now(), SystemTime::now())
    }

    /// Record a settle signal observed at the given instant
    ///
    /// Returns the number of signals the entry now holds.
    pub fn upsert_at(&self, path: PathBuf, now: Instant, wall: SystemTime) -> u32 {
        self.entries
            .entry(path.clone())
            .and_modify(|e| e.refresh(now, wall))
            .or_insert_with(|| PendingEntry::new(path, now, wall))
            .occurrences
    }

    /// Copy out every entry quiet for longer than `quiet`
    pub fn snapshot_due(&self, quiet: Duration, now: Instant) -> Vec<PendingEntry> {
        let mut due: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.value().is_due(quiet, now))
            .map(|e| e.value().clone())
            .collect();
        due.sort_by_key(|e| e.last_seen);
        due
    }

    /// Remove the entry only if no signal has refreshed it since `snapshot`
    pub fn remove_if_unchanged(&self, snapshot: &PendingEntry) -> bool {
        self.entries
            .remove_if(&snapshot.path, |_, current| {
                current.last_seen == snapshot.last_seen
            })
            .is_some()
    }

    pub fn get(&self, path: &Path) -> Option<PendingEntry> {
        self.entries.get(path).map(|e| e.value().clone())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of classifying one raw event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Report this event now
    Dispatch(LogicalEvent),
    /// A write was recorded in the pending table
    Pending,
    /// A directory appeared and must join the watch tree
    RegisterDirectory(PathBuf),
    /// Nothing to do
    Ignored,
}

/// Turns raw events into logical events or pending writes
pub struct EventClassifier {
    matcher: Arc<ExclusionMatcher>,
    pending: Arc<PendingTable>,
    settle_on_modify: bool,
}

impl EventClassifier {
    pub fn new(matcher: Arc<ExclusionMatcher>, pending: Arc<PendingTable>) -> Self {
        Self {
            matcher,
            pending,
            settle_on_modify: false,
        }
    }

    /// Also treat plain data writes as settle signals
    pub fn with_settle_on_modify(mut self, enabled: bool) -> Self {
        self.settle_on_modify = enabled;
        self
    }

    pub fn pending(&self) -> &Arc<PendingTable> {
        &self.pending
    }

    pub fn classify(&self, raw: &RawEvent) -> Classification {
        if raw.is_dir && raw.has(Ops::CREATE) {
            debug!("New directory {}", raw.path.display());
            return Classification::RegisterDirectory(raw.path.clone());
        }

        if self.matcher.should_exclude(&raw.path) {
            debug!("Dropping excluded path {}", raw.path.display());
            return Classification::Ignored;
        }

        if raw.has(Ops::CLOSE_WRITE) || (self.settle_on_modify && raw.has(Ops::WRITE)) {
            let occurrences = self.pending.upsert(raw.path.clone());
            trace!(
                "Pending write for {} ({} signals)",
                raw.path.display(),
                occurrences
            );
            return Classification::Pending;
        }

        if raw.has(Ops::REMOVE) {
            debug!("Remove {}", raw.path.display());
            return Classification::Dispatch(LogicalEvent::remove(raw.path.clone()));
        }

        if raw.has(Ops::CREATE) {
            if let Some(from) = raw.moved_from() {
                if self.matcher.should_exclude(from) {
                    debug!("Dropping move from excluded path {}", from.display());
                    return Classification::Ignored;
                }
                debug!("Move {} -> {}", from.display(), raw.path.display());
                return Classification::Dispatch(LogicalEvent::moved(raw.path.clone(), from));
            }
        }

        Classification::Ignored
    }
}
