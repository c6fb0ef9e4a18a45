//! Delivery of logical events
//!
//! Delivery is fire-and-forget: the [`Dispatcher`] queues events without
//! blocking, and a worker ships each one on its own task, bounded by a
//! semaphore. Outcomes are logged and never fed back into the watcher.

use crate::events::LogicalEvent;
use async_trait::async_trait;
use fsreport_core::{Error, Result};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Destination for finalized events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: &LogicalEvent) -> Result<()>;
}

/// POSTs each event as JSON to a fixed endpoint
pub struct HttpSink {
    client: Client,
    endpoint: String,
}

impl HttpSink {
    /// Create a sink for `endpoint`
    ///
    /// # Arguments
    /// * `timeout` - Per-request timeout
    /// * `accept_invalid_certs` - Skip TLS certificate verification
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        info!("Reporting events to {endpoint}");
        if accept_invalid_certs {
            warn!("TLS certificate verification is disabled for {endpoint}");
        }

        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl EventSink for HttpSink {
    async fn deliver(&self, event: &LogicalEvent) -> Result<()> {
        let payload = event.payload();

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::delivery(format!("Request to {} failed: {e}", self.endpoint)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::delivery(format!(
                "{} {} rejected with status {status}",
                payload.event_type, payload.file_path
            )));
        }

        info!("Reported {} {}", payload.event_type, payload.file_path);
        Ok(())
    }
}

/// Non-blocking handle for queueing events to a sink
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<LogicalEvent>,
}

impl Dispatcher {
    /// Start the delivery worker
    ///
    /// The worker exits once every `Dispatcher` clone has been dropped and
    /// the queue is drained.
    pub fn spawn(
        sink: Arc<dyn EventSink>,
        capacity: usize,
        max_concurrent: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<LogicalEvent>(capacity.max(1));
        let limiter = Arc::new(Semaphore::new(max_concurrent.max(1)));

        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let permit = match Arc::clone(&limiter).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let sink = Arc::clone(&sink);
                tokio::spawn(async move {
                    if let Err(e) = sink.deliver(&event).await {
                        error!(
                            "Failed to report {} {}: {}",
                            event.kind(),
                            event.path().display(),
                            e
                        );
                    }
                    drop(permit);
                });
            }
            debug!("Delivery worker stopped");
        });

        (Self { tx }, worker)
    }

    /// Queue an event, dropping it if the queue is full or closed
    ///
    /// Returns whether the event was queued.
    pub fn dispatch(&self, event: LogicalEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(
                    "Delivery queue full, dropping {} {}",
                    event.kind(),
                    event.path().display()
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!(
                    "Delivery queue closed, dropping {} {}",
                    event.kind(),
                    event.path().display()
                );
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Sink that remembers every delivered event
    #[derive(Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<LogicalEvent>>,
        delivered: Notify,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<LogicalEvent> {
            self.events.lock().expect("sink lock").clone()
        }

        /// Wait until at least `count` events have arrived
        pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<LogicalEvent> {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let notified = self.delivered.notified();
                let events = self.events();
                if events.len() >= count {
                    return events;
                }
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    return self.events();
                }
            }
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn deliver(&self, event: &LogicalEvent) -> Result<()> {
            self.events.lock().expect("sink lock").push(event.clone());
            self.delivered.notify_waiters();
            Ok(())
        }
    }
}
