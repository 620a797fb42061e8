//! DispatchManager - request-processing pipeline and composition point.
//!
//! All queue, store, and policy state is owned by one actor task; callers
//! submit commands through a cloneable handle and never block past
//! submission. Connectivity checks await inside the actor; dispatcher sends
//! fan out to per-dispatcher workers.

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use contracts::{
    keys, merge, payload, BatchTrackRequest, CompletionCallback, ConnectivityMonitor,
    DispatchListener, DispatchRequest, DispatchValidator, Payload, QueueDelegate, SdkConfig,
    TrackRequest, TrackValue,
};
use event_store::SessionTracker;
use observability::metrics as obs;

use crate::handle::DispatcherHandle;
use crate::queue::PersistentDispatchQueue;

/// Queue sweep period while the manager is idle.
const SWEEP_SECONDS: u64 = 60;

/// Commands accepted by the manager actor.
pub enum Command {
    Track(TrackRequest),
    ReleaseQueue { reason: String },
    ConnectionRestored,
    RegisterDispatcher(DispatcherHandle),
    SetLowPower(bool),
    QueueCount(oneshot::Sender<usize>),
    Shutdown,
}

/// Cloneable submitter for the manager actor.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl DispatchHandle {
    /// Track an event; returns as soon as the command is submitted.
    pub fn track(&self, data: Payload) {
        self.track_request(TrackRequest::new(data));
    }

    pub fn track_request(&self, request: TrackRequest) {
        let _ = self.tx.send(Command::Track(request));
    }

    /// Track an event and observe each dispatcher attempt's outcome.
    pub fn track_with_completion(&self, data: Payload, completion: CompletionCallback) {
        self.track_request(TrackRequest::with_completion(data, Some(completion)));
    }

    pub fn release_queue(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Command::ReleaseQueue {
            reason: reason.into(),
        });
    }

    /// Connectivity came back; flush anything held while offline.
    pub fn connection_restored(&self) {
        let _ = self.tx.send(Command::ConnectionRestored);
    }

    /// Register a delivery backend after startup (e.g. once its transport
    /// finished initializing).
    pub fn register_dispatcher(&self, dispatcher: DispatcherHandle) {
        let _ = self.tx.send(Command::RegisterDispatcher(dispatcher));
    }

    /// Low-power signal from the platform; gates auto-release while set.
    pub fn set_low_power(&self, enabled: bool) {
        let _ = self.tx.send(Command::SetLowPower(enabled));
    }

    /// Current persisted queue depth.
    pub async fn queue_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::QueueCount(tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

impl QueueDelegate for DispatchHandle {
    fn request_release(&self, reason: &str) {
        self.release_queue(reason);
    }
}

/// Builder collecting capability registrations before the actor starts.
pub struct DispatchManagerBuilder {
    config: SdkConfig,
    data_dir: PathBuf,
    validators: Vec<Arc<dyn DispatchValidator>>,
    listeners: Vec<Arc<dyn DispatchListener>>,
    dispatchers: Vec<DispatcherHandle>,
}

impl DispatchManagerBuilder {
    pub fn new(config: SdkConfig, data_dir: &Path) -> Self {
        Self {
            config,
            data_dir: data_dir.to_path_buf(),
            validators: Vec::new(),
            listeners: Vec::new(),
            dispatchers: Vec::new(),
        }
    }

    pub fn validator(mut self, validator: Arc<dyn DispatchValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn DispatchListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn dispatcher(mut self, dispatcher: DispatcherHandle) -> Self {
        self.dispatchers.push(dispatcher);
        self
    }

    /// Build the manager and start its actor task.
    pub fn spawn<C: ConnectivityMonitor + Sync + 'static>(
        self,
        connectivity: C,
        sessions: SessionTracker,
    ) -> (DispatchHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = DispatchManager {
            config: self.config,
            validators: self.validators,
            listeners: self.listeners,
            dispatchers: self.dispatchers,
            connectivity,
            queue: PersistentDispatchQueue::open(&self.data_dir),
            sessions,
            low_power_mode: false,
        };
        let handle = DispatchHandle { tx };
        let join = tokio::spawn(manager.run(rx));
        (handle, join)
    }
}

/// The pipeline actor. Owns every piece of mutable dispatch state.
pub struct DispatchManager<C: ConnectivityMonitor> {
    config: SdkConfig,
    validators: Vec<Arc<dyn DispatchValidator>>,
    listeners: Vec<Arc<dyn DispatchListener>>,
    dispatchers: Vec<DispatcherHandle>,
    connectivity: C,
    queue: PersistentDispatchQueue,
    sessions: SessionTracker,
    low_power_mode: bool,
}

impl<C: ConnectivityMonitor> DispatchManager<C> {
    /// Run the manager main loop.
    ///
    /// Consumes commands until shutdown; sweeps expired queue entries and
    /// event data periodically. The first sweep fires immediately, covering
    /// the trim-on-startup requirement.
    #[instrument(name = "dispatch_manager_run", skip(self, rx))]
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!(
            dispatchers = self.dispatchers.len(),
            validators = self.validators.len(),
            listeners = self.listeners.len(),
            "Dispatch manager started"
        );

        let mut sweep = tokio::time::interval(std::time::Duration::from_secs(SWEEP_SECONDS));
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = sweep.tick() => {
                    self.remove_old_dispatches();
                    self.sessions.store_mut().remove_expired();
                }
                command = rx.recv() => match command {
                    Some(Command::Track(request)) => self.process_track(request).await,
                    Some(Command::ReleaseQueue { reason }) => {
                        self.handle_release_request(&reason).await;
                    }
                    Some(Command::ConnectionRestored) => {
                        self.handle_release_request("connection restored").await;
                    }
                    Some(Command::RegisterDispatcher(dispatcher)) => {
                        info!(dispatcher = dispatcher.id(), "Dispatcher registered");
                        self.dispatchers.push(dispatcher);
                    }
                    Some(Command::SetLowPower(enabled)) => {
                        debug!(enabled, "Low power mode changed");
                        self.low_power_mode = enabled;
                    }
                    Some(Command::QueueCount(reply)) => {
                        let _ = reply.send(self.queue.count());
                    }
                    Some(Command::Shutdown) | None => break,
                }
            }
        }

        for dispatcher in self.dispatchers {
            dispatcher.shutdown().await;
        }
        info!("Dispatch manager stopped");
    }

    /// Process one track request end to end.
    #[instrument(name = "process_track", skip(self, request), fields(request_id = %request.id))]
    pub async fn process_track(&mut self, mut request: TrackRequest) {
        obs::record_track_processed();

        // release first if the dispatch limit has been reached
        if self.should_release() {
            self.handle_release_request("processing track request").await;
        }

        // session bookkeeping, then enrich from the store (caller keys win)
        self.sessions.refresh_session();
        let mut data = self.sessions.all_event_data();
        merge(&mut data, mem::take(&mut request.data));
        request.data = data;

        if self.check_should_queue(&mut request) {
            self.queue_validated(request);
            return;
        }

        if self.check_should_drop(&request) {
            return;
        }

        if self.check_should_purge(&request) {
            let purged = self.queue.clear();
            obs::record_purged(purged);
            obs::record_queue_depth(0);
            info!(purged, "Queue purged by validator");
            return;
        }

        if !self.is_connected().await {
            self.enqueue(request, keys::queue_reason::CONNECTIVITY).await;
            return;
        }

        if let Some(reason) = self.batching_decision(&request) {
            self.enqueue(request, reason).await;
            return;
        }

        if self.dispatchers.is_empty() {
            self.enqueue(request, keys::queue_reason::DISPATCHERS_NOT_READY)
                .await;
            return;
        }

        self.run_dispatchers(DispatchRequest::Track(request));
    }

    /// Release the queue if online and no validator currently gates a
    /// sentinel probe request.
    async fn handle_release_request(&mut self, reason: &str) {
        if !self.is_connected().await {
            return;
        }
        if self.dispatchers.is_empty() {
            return;
        }

        // dummy request to check if queueing is active
        let mut probe = TrackRequest::new(payload! { "release_request" => true });
        if self.check_should_queue(&mut probe)
            || self.check_should_drop(&probe)
            || self.check_should_purge(&probe)
        {
            return;
        }

        if self.queue.count() > 0 {
            info!(reason, "Releasing queued dispatches");
            self.release_queue();
        }
    }

    /// Dequeue everything and hand it off in order, chunked by the batch
    /// size. Single-entry chunks are flagged to bypass the queue so they are
    /// not re-queued on the way out.
    fn release_queue(&mut self) {
        let requests = self.queue.dequeue_all();
        obs::record_released(requests.len());
        obs::record_queue_depth(0);

        for chunk in requests.chunks(self.config.effective_batch_size()) {
            match chunk.len() {
                0 => {}
                1 => {
                    let mut single = chunk[0].clone();
                    single.insert(keys::BYPASS_QUEUE, TrackValue::Bool(true));
                    self.run_dispatchers(DispatchRequest::Track(single));
                }
                _ => {
                    let batch = BatchTrackRequest::new(chunk.to_vec());
                    self.run_dispatchers(DispatchRequest::Batch(batch));
                }
            }
        }
    }

    fn run_dispatchers(&self, request: DispatchRequest) {
        for listener in &self.listeners {
            listener.will_track(&request);
        }
        let (uuid, event) = {
            let (uuid, event) = request.log_identity();
            (uuid.to_string(), event.to_string())
        };
        info!(request_id = %uuid, event = %event, "Sending dispatch");
        for dispatcher in &self.dispatchers {
            dispatcher.try_send(request.clone());
        }
    }

    fn check_should_queue(&self, request: &mut TrackRequest) -> bool {
        let mut queue = false;
        for validator in &self.validators {
            let (should_queue, response) = validator.should_queue(request);
            if should_queue {
                if let Some(response) = response {
                    info!(
                        validator = validator.id(),
                        "Track request enqueued by dispatch validator"
                    );
                    request.merge(response);
                }
                queue = true;
            }
        }
        queue
    }

    fn check_should_drop(&self, request: &TrackRequest) -> bool {
        for validator in &self.validators {
            if validator.should_drop(request) {
                info!(
                    validator = validator.id(),
                    "Track request dropped by dispatch validator"
                );
                obs::record_dropped(validator.id());
                return true;
            }
        }
        false
    }

    fn check_should_purge(&self, request: &TrackRequest) -> bool {
        for validator in &self.validators {
            if validator.should_purge(request) {
                info!(
                    validator = validator.id(),
                    "Purge request received from dispatch validator"
                );
                return true;
            }
        }
        false
    }

    /// Persist a request a validator asked to queue. The validator already
    /// merged its info (queue reason included) into the payload.
    fn queue_validated(&mut self, mut request: TrackRequest) {
        self.remove_old_dispatches();
        request.insert(keys::WAS_QUEUED, TrackValue::from("true"));
        let reason = request
            .data
            .get(keys::QUEUE_REASON)
            .and_then(TrackValue::as_str)
            .unwrap_or("validator")
            .to_string();
        self.queue.append(&request);
        obs::record_enqueued(&reason);
        obs::record_queue_depth(self.queue.count());
        self.log_queue(&request, &reason);
    }

    /// Persist a request held back by policy, then auto-release if the
    /// queue just hit the dispatch limit.
    async fn enqueue(&mut self, mut request: TrackRequest, reason: &str) {
        self.remove_old_dispatches();
        request.insert(keys::QUEUE_REASON, TrackValue::from(reason));
        request.insert(keys::WAS_QUEUED, TrackValue::from("true"));
        self.queue.append(&request);
        obs::record_enqueued(reason);
        obs::record_queue_depth(self.queue.count());
        self.log_queue(&request, reason);

        if self.should_release() {
            self.handle_release_request("dispatch queue limit reached").await;
        }
    }

    fn log_queue(&self, request: &TrackRequest, reason: &str) {
        info!(
            request_id = %request.id,
            event = %request.event().unwrap_or(""),
            reason,
            "Event queued for batch dispatch"
        );
    }

    fn should_release(&self) -> bool {
        !self.dispatchers.is_empty()
            && self.queue.count() >= self.config.events_before_auto_dispatch
            && self.has_sufficient_battery(self.queue.peek_last().as_ref())
    }

    async fn is_connected(&self) -> bool {
        match self.connectivity.check_is_connected().await {
            Ok(connected) => connected,
            Err(e) => {
                warn!(error = %e, "Connectivity check failed, treating as offline");
                false
            }
        }
    }

    /// Internal batching policy, evaluated after the validators. `Some`
    /// carries the queue reason; `None` means deliver now.
    fn batching_decision(&self, request: &TrackRequest) -> Option<&'static str> {
        if !self.queue.can_write() {
            return None;
        }
        if !self.has_sufficient_battery(Some(request)) {
            return Some(keys::queue_reason::INSUFFICIENT_BATTERY);
        }
        if request.bypass_queue() {
            return None;
        }
        if !self.config.batching_enabled {
            return None;
        }
        if self.config.events_before_auto_dispatch <= 1 {
            return None;
        }
        if self.config.effective_batch_size() <= 1 {
            return None;
        }
        if self.config.effective_max_queue_size() <= 1 {
            return None;
        }
        if self.is_bypass_event(request) {
            return None;
        }
        Some(keys::queue_reason::BATCHING_ENABLED)
    }

    fn is_bypass_event(&self, request: &TrackRequest) -> bool {
        let Some(event) = request.event() else {
            // unnamed events are never held back
            return true;
        };
        contracts::events::BATCHING_BYPASS
            .iter()
            .any(|name| *name == event)
            || self
                .config
                .batching_bypass_events
                .iter()
                .any(|name| name == event)
    }

    /// Battery policy: with battery saver enabled, the low-power signal or a
    /// reported battery level below the threshold blocks delivery.
    fn has_sufficient_battery(&self, request: Option<&TrackRequest>) -> bool {
        let Some(request) = request else {
            return true;
        };
        if !self.config.battery_saver_enabled {
            return true;
        }
        if self.low_power_mode {
            return false;
        }
        let Some(percent) = request
            .data
            .get(keys::BATTERY_PERCENT)
            .and_then(TrackValue::as_f64)
        else {
            return true;
        };
        // simulator case
        if percent == contracts::defaults::SIMULATOR_BATTERY_LEVEL {
            return true;
        }
        percent >= contracts::defaults::LOW_BATTERY_THRESHOLD
    }

    /// Age out persisted entries past the batch expiration and cap the
    /// queue at its configured size.
    fn remove_old_dispatches(&mut self) {
        let cutoff = Utc::now() - Duration::days(self.config.effective_batch_expiration_days());
        let trimmed = self.queue.trim_older_than(
            cutoff.timestamp_millis(),
            self.config.effective_max_queue_size(),
        );
        if trimmed > 0 {
            debug!(trimmed, "Removed old dispatches");
        }
        obs::record_queue_depth(self.queue.count());
    }
}
