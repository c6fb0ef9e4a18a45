//! Periodic flush of settled writes

use crate::debouncer::PendingTable;
use crate::sink::Dispatcher;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Flushes pending writes once their path has been quiet long enough
pub struct Reaper {
    pending: Arc<PendingTable>,
    dispatcher: Dispatcher,
    quiet_period: Duration,
    interval: Duration,
    spacing: Duration,
}

impl Reaper {
    pub fn new(
        pending: Arc<PendingTable>,
        dispatcher: Dispatcher,
        quiet_period: Duration,
        interval: Duration,
        spacing: Duration,
    ) -> Self {
        Self {
            pending,
            dispatcher,
            quiet_period,
            interval,
            spacing,
        }
    }

    /// Run one scan, returning the number of writes dispatched
    ///
    /// Due entries are dispatched oldest first with `spacing` between them.
    /// Entries are removed only after the whole snapshot is dispatched, and
    /// only if no new settle signal arrived in the meantime.
    pub async fn reap_once(&self) -> usize {
        let due = self.pending.snapshot_due(self.quiet_period, Instant::now());
        if due.is_empty() {
            return 0;
        }

        debug!("Flushing {} settled writes", due.len());
        for (i, entry) in due.iter().enumerate() {
            if i > 0 && !self.spacing.is_zero() {
                sleep(self.spacing).await;
            }
            debug!(
                "Write settled for {} ({} signals)",
                entry.path.display(),
                entry.occurrences
            );
            self.dispatcher.dispatch(entry.to_event());
        }

        for entry in &due {
            if !self.pending.remove_if_unchanged(entry) {
                debug!("{} written again during flush, keeping", entry.path.display());
            }
        }

        due.len()
    }

    /// Scan every `interval` until `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Reaper started (quiet period {:?}, interval {:?})",
                self.quiet_period, self.interval
            );
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(self.interval) => {
                        self.reap_once().await;
                    }
                }
            }
            debug!("Reaper stopped");
        })
    }
}
