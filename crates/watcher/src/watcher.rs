//! File watcher orchestration
//!
//! Wires the notify callback to an event loop that keeps the watch tree in
//! sync, classifies raw events, and hands logical events to the dispatcher.
//! The reaper runs alongside it on its own task.

use crate::{
    config::WatcherConfig,
    debouncer::{Classification, EventClassifier, PendingTable},
    events::{Ops, RawEvent},
    exclude::ExclusionMatcher,
    reaper::Reaper,
    sink::Dispatcher,
    tree::{NotifyRegistry, WatchTree},
};
use fsreport_core::error::{Error, Result};
use notify::{Config as NotifyConfig, Event as NotifyEvent, RecommendedWatcher, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

type NotifyResult = std::result::Result<NotifyEvent, notify::Error>;

/// Watches a directory tree and reports settled changes
pub struct FileWatcher {
    config: Arc<WatcherConfig>,
    matcher: Arc<ExclusionMatcher>,
    dispatcher: Dispatcher,
    pending: Arc<PendingTable>,
    /// Present while watching
    tree: Option<Arc<WatchTree>>,
    cancellation_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl FileWatcher {
    pub fn new(
        config: WatcherConfig,
        matcher: Arc<ExclusionMatcher>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            config: Arc::new(config),
            matcher,
            dispatcher,
            pending: Arc::new(PendingTable::new()),
            tree: None,
            cancellation_token: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Start watching `root` and everything beneath it
    ///
    /// Fails if the root cannot be registered within the retry budget.
    /// Problems with individual subdirectories are logged and skipped.
    pub async fn watch(&mut self, root: impl AsRef<Path>) -> Result<()> {
        let root = root.as_ref().to_path_buf();
        if self.tree.is_some() {
            return Err(Error::watcher("File watcher is already running"));
        }

        let (notify_tx, notify_rx) = mpsc::channel(self.config.max_queue_size.max(1));
        let watcher = create_notify_watcher(notify_tx)?;
        let tree = Arc::new(WatchTree::new(
            Arc::new(NotifyRegistry::new(watcher)),
            self.config.retry_policy(),
        ));

        let subdirs = tree.add_tree(&root).await?;
        info!("Watching {} ({} subdirectories)", root.display(), subdirs);

        let classifier = EventClassifier::new(Arc::clone(&self.matcher), Arc::clone(&self.pending))
            .with_settle_on_modify(self.config.settle_on_modify);
        let processor = EventProcessor::new(classifier, Arc::clone(&tree), self.dispatcher.clone());
        self.tasks
            .push(processor.spawn(notify_rx, self.cancellation_token.clone()));

        let reaper = Reaper::new(
            Arc::clone(&self.pending),
            self.dispatcher.clone(),
            self.config.quiet_period(),
            self.config.reap_interval(),
            self.config.dispatch_spacing(),
        );
        self.tasks.push(reaper.spawn(self.cancellation_token.clone()));

        self.tree = Some(tree);
        Ok(())
    }

    /// Stop the event loop and reaper and release OS watches
    ///
    /// Pending writes that have not settled yet are discarded.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation_token.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("Watcher task failed: {}", e);
            }
        }
        if self.tree.take().is_some() {
            info!(
                "File watcher stopped ({} unsettled writes discarded)",
                self.pending.len()
            );
        }
        Ok(())
    }

    /// Currently registered directories
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.tree
            .as_ref()
            .map(|t| t.watched_paths())
            .unwrap_or_default()
    }

    /// Whether `path` is a registered directory
    pub fn is_watching(&self, path: &Path) -> bool {
        self.tree.as_ref().is_some_and(|t| t.is_watched(path))
    }

    /// Writes waiting for their quiet period
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

fn create_notify_watcher(tx: mpsc::Sender<NotifyResult>) -> Result<RecommendedWatcher> {
    RecommendedWatcher::new(
        move |res: NotifyResult| {
            if let Err(e) = tx.try_send(res) {
                error!("Failed to queue notify event: {}", e);
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|e| Error::watcher(format!("Failed to create watcher: {e}")))
}

/// Applies raw events to the watch tree, classifier, and dispatcher
pub struct EventProcessor {
    classifier: EventClassifier,
    tree: Arc<WatchTree>,
    dispatcher: Dispatcher,
}

impl EventProcessor {
    pub fn new(classifier: EventClassifier, tree: Arc<WatchTree>, dispatcher: Dispatcher) -> Self {
        Self {
            classifier,
            tree,
            dispatcher,
        }
    }

    pub fn handle_notify(&self, res: NotifyResult) {
        match res {
            Ok(event) => {
                trace!("Received notify event: {:?}", event);
                for raw in RawEvent::from_notify(event) {
                    self.handle(raw);
                }
            }
            Err(e) => error!("Notify error: {}", e),
        }
    }

    pub fn handle(&self, raw: RawEvent) {
        trace!("Raw event: {:?}", raw);

        // Paths that left the tree take their registrations with them.
        if raw.has(Ops::REMOVE) || (raw.has(Ops::RENAME) && !raw.has(Ops::CREATE)) {
            let forgotten = self.tree.forget(&raw.path);
            // A watched directory reports its own deletion as well as the
            // parent's; only the first one is reported.
            if raw.has(Ops::REMOVE) && raw.is_dir && forgotten == 0 {
                trace!("Duplicate directory removal for {}", raw.path.display());
                return;
            }
        }
        if let Some(from) = raw.moved_from() {
            self.tree.forget(from);
        }

        match self.classifier.classify(&raw) {
            Classification::Dispatch(event) => {
                self.dispatcher.dispatch(event);
            }
            Classification::RegisterDirectory(dir) => {
                self.tree.spawn_add_tree(dir);
            }
            Classification::Pending | Classification::Ignored => {}
        }
    }

    fn spawn(
        self,
        mut rx: mpsc::Receiver<NotifyResult>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    res = rx.recv() => match res {
                        Some(res) => self.handle_notify(res),
                        None => break,
                    },
                }
            }
            debug!("Event processor stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogicalEventKind;
    use crate::sink::testing::RecordingSink;
    use crate::tree::testing::RecordingRegistry;
    use crate::tree::RetryPolicy;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    fn processor(
        matcher: ExclusionMatcher,
    ) -> (EventProcessor, Arc<WatchTree>, Arc<RecordingSink>, Arc<PendingTable>) {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, _worker) = Dispatcher::spawn(sink.clone(), 64, 4);
        let pending = Arc::new(PendingTable::new());
        let tree = Arc::new(WatchTree::new(
            Arc::new(RecordingRegistry::default()),
            RetryPolicy {
                attempts: 3,
                delay: Duration::from_millis(5),
            },
        ));
        let classifier = EventClassifier::new(Arc::new(matcher), Arc::clone(&pending));
        (
            EventProcessor::new(classifier, Arc::clone(&tree), dispatcher),
            tree,
            sink,
            pending,
        )
    }

    async fn setup_test_watcher() -> (TempDir, FileWatcher, Arc<RecordingSink>) {
        let temp_dir = TempDir::new().expect("test setup failed");
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, _worker) = Dispatcher::spawn(sink.clone(), 64, 4);
        let config = WatcherConfig::builder()
            .retry_delay_ms(5)
            .quiet_period_ms(100)
            .reap_interval_ms(50)
            .dispatch_spacing_ms(0)
            .build();
        let watcher = FileWatcher::new(config, Arc::new(ExclusionMatcher::new()), dispatcher);
        (temp_dir, watcher, sink)
    }

    #[tokio::test]
    async fn test_watcher_initialization() {
        let (_temp_dir, watcher, _sink) = setup_test_watcher().await;
        assert!(watcher.watched_paths().is_empty());
        assert_eq!(watcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_watch_registers_tree() {
        let (temp_dir, mut watcher, _sink) = setup_test_watcher().await;
        std::fs::create_dir_all(temp_dir.path().join("a/b")).expect("test setup failed");

        watcher.watch(temp_dir.path()).await.expect("watch");

        assert!(watcher.is_watching(temp_dir.path()));
        assert!(watcher.is_watching(&temp_dir.path().join("a")));
        assert!(watcher.is_watching(&temp_dir.path().join("a/b")));
        assert_eq!(watcher.watched_paths().len(), 3);

        watcher.stop().await.expect("stop");
        assert!(watcher.watched_paths().is_empty());
    }

    #[tokio::test]
    async fn test_watch_twice_is_error() {
        let (temp_dir, mut watcher, _sink) = setup_test_watcher().await;
        watcher.watch(temp_dir.path()).await.expect("watch");

        assert!(watcher.watch(temp_dir.path()).await.is_err());
        watcher.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn test_watch_missing_root_fails() {
        let (temp_dir, mut watcher, _sink) = setup_test_watcher().await;
        let result = watcher.watch(temp_dir.path().join("missing")).await;

        assert!(matches!(result, Err(Error::WithContext { .. })));
        assert!(watcher.watched_paths().is_empty());
    }

    #[tokio::test]
    async fn test_remove_dispatches_and_prunes_tree() {
        let (processor, tree, sink, _pending) = processor(ExclusionMatcher::new());
        let dir = TempDir::new().expect("temp dir");
        std::fs::create_dir(dir.path().join("sub")).expect("sub dir");
        tree.add_tree(dir.path()).await.expect("add tree");

        processor.handle(RawEvent::new(dir.path().join("sub"), Ops::REMOVE));

        let events = sink.wait_for(1, Duration::from_secs(2)).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), LogicalEventKind::Remove);
        assert!(!tree.is_watched(&dir.path().join("sub")));
        assert!(tree.is_watched(dir.path()));
    }

    #[tokio::test]
    async fn test_directory_removal_is_reported_once() {
        let (processor, tree, sink, _pending) = processor(ExclusionMatcher::new());
        let dir = TempDir::new().expect("temp dir");
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).expect("sub dir");
        tree.add_tree(dir.path()).await.expect("add tree");

        // once from the parent's watch, once from the directory's own
        processor.handle(RawEvent::new(&sub, Ops::REMOVE).directory());
        processor.handle(RawEvent::new(&sub, Ops::REMOVE).directory());

        sink.wait_for(1, Duration::from_secs(2)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), LogicalEventKind::Remove);
        assert_eq!(events[0].path(), sub.as_path());
    }

    #[tokio::test]
    async fn test_directory_create_registers_subtree() {
        let (processor, tree, sink, _pending) = processor(ExclusionMatcher::new());
        let dir = TempDir::new().expect("temp dir");
        let sub = dir.path().join("new");
        std::fs::create_dir_all(sub.join("inner")).expect("subtree");

        processor.handle(RawEvent::new(&sub, Ops::CREATE).directory());

        for _ in 0..100 {
            if tree.is_watched(&sub.join("inner")) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(tree.is_watched(&sub));
        assert!(tree.is_watched(&sub.join("inner")));
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_settle_signal_goes_pending() {
        let (processor, _tree, sink, pending) = processor(ExclusionMatcher::new());

        processor.handle(RawEvent::new("/root/file.txt", Ops::CLOSE_WRITE));
        processor.handle(RawEvent::new("/root/file.txt", Ops::CLOSE_WRITE));

        assert_eq!(pending.len(), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_notify_errors_are_not_fatal() {
        let (processor, _tree, sink, _pending) = processor(ExclusionMatcher::new());

        processor.handle_notify(Err(notify::Error::generic("queue overflow")));
        processor.handle_notify(Ok(NotifyEvent::new(notify::EventKind::Remove(
            notify::event::RemoveKind::File,
        ))
        .add_path(PathBuf::from("/root/gone.txt"))));

        let events = sink.wait_for(1, Duration::from_secs(2)).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path(), Path::new("/root/gone.txt"));
    }
}
