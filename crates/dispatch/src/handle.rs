//! DispatcherHandle - manages a delivery backend with isolated queue and
//! worker task, so one slow or failing backend never stalls the pipeline or
//! its peers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use contracts::{DispatchOutcome, DispatchRequest, ErrorKind, EventDispatcher, Payload};

use crate::metrics::DispatcherMetrics;

/// Handle to a running dispatcher worker
pub struct DispatcherHandle {
    /// Dispatcher name
    id: String,
    /// Channel to send requests to the worker
    tx: mpsc::Sender<DispatchRequest>,
    /// Shared metrics
    metrics: Arc<DispatcherMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Create a new DispatcherHandle and spawn the worker task
    pub fn spawn<D: EventDispatcher + Send + 'static>(dispatcher: D, queue_capacity: usize) -> Self {
        let id = dispatcher.id().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity);
        let metrics = Arc::new(DispatcherMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_id = id.clone();

        let worker_handle = tokio::spawn(async move {
            dispatcher_worker(dispatcher, rx, worker_metrics, worker_id).await;
        });

        Self {
            id,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn metrics(&self) -> &Arc<DispatcherMetrics> {
        &self.metrics
    }

    /// Send a request to the dispatcher (non-blocking)
    ///
    /// Returns true if sent, false if queue full (request dropped)
    pub fn try_send(&self, request: DispatchRequest) -> bool {
        match self.tx.try_send(request) {
            Ok(()) => {
                self.metrics.set_queue_len(self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(r)) => {
                self.metrics.inc_dropped_count();
                let (uuid, event) = r.log_identity();
                warn!(
                    dispatcher = %self.id,
                    request_id = %uuid,
                    event = %event,
                    "Queue full, request dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(dispatcher = %self.id, "Dispatcher worker closed unexpectedly");
                false
            }
        }
    }

    /// Shutdown the dispatcher worker gracefully
    #[instrument(name = "dispatcher_handle_shutdown", skip(self))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(dispatcher = %self.id, error = ?e, "Worker task panicked");
        }
        debug!(dispatcher = %self.id, "DispatcherHandle shutdown complete");
    }
}

/// Worker task that consumes requests and hands them to the backend.
///
/// Each attempt's outcome is logged and reported through the request's
/// completion callback; a failure never aborts the worker.
#[instrument(
    name = "dispatcher_worker_loop",
    skip(dispatcher, rx, metrics),
    fields(dispatcher = %id)
)]
async fn dispatcher_worker<D: EventDispatcher>(
    mut dispatcher: D,
    mut rx: mpsc::Receiver<DispatchRequest>,
    metrics: Arc<DispatcherMetrics>,
    id: String,
) {
    debug!(dispatcher = %id, "Dispatcher worker started");

    while let Some(request) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        let (uuid, event) = {
            let (uuid, event) = request.log_identity();
            (uuid.to_string(), event.to_string())
        };
        match dispatcher.send(&request).await {
            Ok(info) => {
                metrics.inc_success_count();
                observability::record_dispatched(&id, true);
                info!(
                    dispatcher = %id,
                    event = %event,
                    request_id = %uuid,
                    "Successful track"
                );
                notify(&request, &id, true, info, None);
            }
            Err(e) => {
                metrics.inc_failure_count();
                observability::record_dispatched(&id, false);
                error!(
                    dispatcher = %id,
                    event = %event,
                    request_id = %uuid,
                    error = %e,
                    "Track failed"
                );
                notify(&request, &id, false, None, e.kind());
                // Continue processing - don't crash on single failure
            }
        }
    }

    debug!(dispatcher = %id, "Dispatcher worker stopped");
}

fn notify(
    request: &DispatchRequest,
    dispatcher: &str,
    success: bool,
    info: Option<Payload>,
    error: Option<ErrorKind>,
) {
    if let Some(completion) = request.completion() {
        completion(&DispatchOutcome {
            dispatcher: dispatcher.to_string(),
            success,
            info,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{payload, CoreError, TrackRequest};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, Duration};

    /// Mock dispatcher for testing
    struct MockDispatcher {
        id: String,
        sent_count: Arc<AtomicU64>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl EventDispatcher for MockDispatcher {
        fn id(&self) -> &str {
            &self.id
        }

        async fn send(&mut self, _request: &DispatchRequest) -> Result<Option<Payload>, CoreError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(CoreError::non_success(&self.id, "mock failure"));
            }
            self.sent_count.fetch_add(1, Ordering::Relaxed);
            Ok(None)
        }
    }

    fn track(event: &str) -> DispatchRequest {
        DispatchRequest::Track(TrackRequest::new(payload! { "event" => event }))
    }

    #[tokio::test]
    async fn test_dispatcher_handle_basic() {
        let sent_count = Arc::new(AtomicU64::new(0));
        let dispatcher = MockDispatcher {
            id: "test".to_string(),
            sent_count: Arc::clone(&sent_count),
            should_fail: false,
            delay_ms: 0,
        };

        let handle = DispatcherHandle::spawn(dispatcher, 10);

        for i in 0..5 {
            assert!(handle.try_send(track(&format!("event_{i}"))));
        }

        handle.shutdown().await;
        assert_eq!(sent_count.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_dispatcher_handle_queue_full() {
        let dispatcher = MockDispatcher {
            id: "slow".to_string(),
            sent_count: Arc::new(AtomicU64::new(0)),
            should_fail: false,
            delay_ms: 100, // Slow backend
        };

        // Small queue capacity
        let handle = DispatcherHandle::spawn(dispatcher, 2);

        for i in 0..10 {
            handle.try_send(track(&format!("event_{i}")));
        }

        // Some should have been dropped
        assert!(handle.metrics().dropped_count() > 0);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatcher_handle_failure_isolation() {
        let dispatcher = MockDispatcher {
            id: "failing".to_string(),
            sent_count: Arc::new(AtomicU64::new(0)),
            should_fail: true,
            delay_ms: 0,
        };

        let handle = DispatcherHandle::spawn(dispatcher, 10);

        for i in 0..3 {
            handle.try_send(track(&format!("event_{i}")));
        }

        // Give worker time to process
        sleep(Duration::from_millis(50)).await;

        // Should have recorded failures without dying
        assert!(handle.metrics().failure_count() > 0);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_completion_reports_error_kind() {
        use std::sync::Mutex;

        let dispatcher = MockDispatcher {
            id: "failing".to_string(),
            sent_count: Arc::new(AtomicU64::new(0)),
            should_fail: true,
            delay_ms: 0,
        };
        let handle = DispatcherHandle::spawn(dispatcher, 10);

        let outcomes: Arc<Mutex<Vec<DispatchOutcome>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);
        let request = TrackRequest::with_completion(
            payload! { "event" => "view" },
            Some(Arc::new(move |outcome: &DispatchOutcome| {
                sink.lock().unwrap().push(outcome.clone());
            })),
        );
        handle.try_send(DispatchRequest::Track(request));
        handle.shutdown().await;

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
        assert_eq!(outcomes[0].error, Some(ErrorKind::NonSuccessResponse));
        assert_eq!(outcomes[0].dispatcher, "failing");
    }
}
