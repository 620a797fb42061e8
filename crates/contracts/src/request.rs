//! Track and batch request data types.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::keys;
use crate::value::{merge, Payload, TrackValue};

/// Keys factored out of batch members into the `shared` object: identifiers
/// common to every event emitted by one SDK instance.
pub const SHARED_KEYS: &[&str] = &[
    keys::ACCOUNT,
    keys::PROFILE,
    keys::DATASOURCE,
    keys::LIBRARY_NAME,
    keys::LIBRARY_VERSION,
    "visitor_id",
    "device",
    "device_model",
    "device_architecture",
    "device_cputype",
    "device_language",
    "device_resolution",
    "platform",
    "os_name",
    "os_version",
    "app_uuid",
];

/// Outcome of one dispatcher attempt, reported via the completion callback.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub dispatcher: String,
    pub success: bool,
    pub info: Option<Payload>,
    pub error: Option<ErrorKind>,
}

/// Fired once per dispatcher attempt; must not assume any particular thread.
pub type CompletionCallback = Arc<dyn Fn(&DispatchOutcome) + Send + Sync>;

/// One analytics event as a key/value map.
///
/// The unique id is generated at construction, mirrored into the payload
/// under `request_id`, and survives every copy and persistence round-trip.
#[derive(Clone, Serialize, Deserialize)]
pub struct TrackRequest {
    pub id: String,
    pub data: Payload,
    #[serde(skip)]
    pub completion: Option<CompletionCallback>,
}

impl fmt::Debug for TrackRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackRequest")
            .field("id", &self.id)
            .field("data", &self.data)
            .field("has_completion", &self.completion.is_some())
            .finish()
    }
}

impl TrackRequest {
    pub fn new(data: Payload) -> Self {
        Self::with_completion(data, None)
    }

    pub fn with_completion(mut data: Payload, completion: Option<CompletionCallback>) -> Self {
        let existing = data
            .get(keys::REQUEST_ID)
            .and_then(TrackValue::as_str)
            .map(str::to_owned);
        let id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                data.insert(keys::REQUEST_ID.to_string(), TrackValue::from(id.as_str()));
                id
            }
        };
        Self {
            id,
            data,
            completion,
        }
    }

    /// Event name, if the payload carries one.
    pub fn event(&self) -> Option<&str> {
        self.data.get(keys::EVENT).and_then(TrackValue::as_str)
    }

    /// The distinguished ordering timestamp.
    pub fn timestamp_unix_ms(&self) -> Option<i64> {
        self.data
            .get(keys::TIMESTAMP_UNIX_MS)
            .and_then(TrackValue::as_i64)
    }

    pub fn was_queued(&self) -> bool {
        self.data
            .get(keys::WAS_QUEUED)
            .and_then(TrackValue::as_str)
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    pub fn bypass_queue(&self) -> bool {
        self.data
            .get(keys::BYPASS_QUEUE)
            .and_then(TrackValue::as_bool)
            .unwrap_or(false)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: TrackValue) {
        self.data.insert(key.into(), value);
    }

    /// Merge `extra` into the payload, `extra` winning on collision. The
    /// request id is re-pinned afterwards so no merge can replace it.
    pub fn merge(&mut self, extra: Payload) {
        merge(&mut self.data, extra);
        self.data.insert(
            keys::REQUEST_ID.to_string(),
            TrackValue::from(self.id.as_str()),
        );
    }

    pub fn delete_key(&mut self, key: &str) {
        self.data.remove(key);
    }
}

impl PartialEq for TrackRequest {
    fn eq(&self, other: &Self) -> bool {
        match (self.timestamp_unix_ms(), other.timestamp_unix_ms()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => true,
            _ => false,
        }
    }
}

impl PartialOrd for TrackRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.timestamp_unix_ms(), other.timestamp_unix_ms()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

/// An ordered group of track requests dispatched together.
#[derive(Clone, Serialize, Deserialize)]
pub struct BatchTrackRequest {
    pub id: String,
    pub requests: Vec<TrackRequest>,
    #[serde(skip)]
    pub completion: Option<CompletionCallback>,
}

impl fmt::Debug for BatchTrackRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchTrackRequest")
            .field("id", &self.id)
            .field("len", &self.requests.len())
            .finish()
    }
}

impl BatchTrackRequest {
    pub fn new(requests: Vec<TrackRequest>) -> Self {
        Self::with_completion(requests, None)
    }

    pub fn with_completion(
        requests: Vec<TrackRequest>,
        completion: Option<CompletionCallback>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            requests,
            completion,
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Compressed projection: `{ "events": [...], "shared": {...} }`.
    ///
    /// Shared keys are taken from the first member and removed from every
    /// event's residual payload. Re-merging `shared` into each event
    /// reconstructs the originals. `None` for an empty batch.
    pub fn compressed(&self) -> Option<Payload> {
        let first = self.requests.first()?;

        let shared: Payload = SHARED_KEYS
            .iter()
            .filter_map(|key| {
                first
                    .data
                    .get(*key)
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect();

        let events: Vec<TrackValue> = self
            .requests
            .iter()
            .map(|request| {
                let residual: Payload = request
                    .data
                    .iter()
                    .filter(|(key, _)| !SHARED_KEYS.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                TrackValue::Map(residual)
            })
            .collect();

        let mut compressed = Payload::new();
        compressed.insert("events".to_string(), TrackValue::List(events));
        compressed.insert("shared".to_string(), TrackValue::Map(shared));
        Some(compressed)
    }
}

/// The unit handed to dispatchers and listeners.
#[derive(Debug, Clone)]
pub enum DispatchRequest {
    Track(TrackRequest),
    Batch(BatchTrackRequest),
}

impl DispatchRequest {
    pub fn completion(&self) -> Option<&CompletionCallback> {
        match self {
            Self::Track(request) => request.completion.as_ref(),
            Self::Batch(batch) => batch.completion.as_ref(),
        }
    }

    /// `(uuid, event-name)` pair used in per-dispatcher log lines.
    pub fn log_identity(&self) -> (&str, &str) {
        match self {
            Self::Track(request) => (request.id.as_str(), request.event().unwrap_or("")),
            Self::Batch(batch) => (batch.id.as_str(), "batch"),
        }
    }
}

impl From<TrackRequest> for DispatchRequest {
    fn from(request: TrackRequest) -> Self {
        Self::Track(request)
    }
}

impl From<BatchTrackRequest> for DispatchRequest {
    fn from(batch: BatchTrackRequest) -> Self {
        Self::Batch(batch)
    }
}
