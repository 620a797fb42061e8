//! Session boundary detection over the event data store.
//!
//! A session id is itself an event data item with `Session` expiration, so a
//! quiet period lets it lapse and the next track starts a fresh session.
//! Separately, two tracks inside the rapid-track window roll a new backend
//! session when tag-management delivery needs one.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument};

use contracts::{keys, Payload, SdkConfig, SessionStarter, TrackValue};

use crate::expiration::Expiration;
use crate::store::EventDataStore;

/// Wraps the store with session bookkeeping.
pub struct SessionTracker {
    store: EventDataStore,
    session_starter: Option<Box<dyn SessionStarter>>,
    tag_management_enabled: bool,
    should_start_session: bool,
    seconds_between_track_events: u64,
    last_track_at: Option<DateTime<Utc>>,
    tracks_in_window: u32,
}

impl SessionTracker {
    pub fn new(
        store: EventDataStore,
        config: &SdkConfig,
        session_starter: Option<Box<dyn SessionStarter>>,
    ) -> Self {
        let mut tracker = Self {
            store,
            session_starter,
            tag_management_enabled: config.tag_management_enabled,
            should_start_session: false,
            seconds_between_track_events: config.seconds_between_track_events,
            last_track_at: None,
            tracks_in_window: 0,
        };
        tracker.refresh_session();
        tracker
    }

    pub fn store(&self) -> &EventDataStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EventDataStore {
        &mut self.store
    }

    /// Merged enrichment view; see [`EventDataStore::all_event_data`].
    pub fn all_event_data(&mut self) -> Payload {
        self.store.all_event_data()
    }

    /// Current session id, if one exists and has not lapsed.
    pub fn session_id(&self) -> Option<String> {
        self.store
            .get_unexpired(keys::SESSION_ID)
            .and_then(TrackValue::as_str)
            .map(str::to_owned)
    }

    /// Session window bookkeeping, run once per processed track event.
    ///
    /// Two tracks inside `seconds_between_track_events` roll a new backend
    /// session; when the within-window count is anything other than exactly
    /// two, the window state is deliberately left untouched.
    pub fn record_track(&mut self) {
        let now = Utc::now();
        match self.last_track_at {
            None => {
                self.last_track_at = Some(now);
                self.tracks_in_window = 1;
            }
            Some(last) => {
                let window = Duration::seconds(self.seconds_between_track_events as i64);
                if now < last + window {
                    if self.tracks_in_window + 1 == 2 {
                        self.start_new_session();
                        self.should_start_session = false;
                        self.tracks_in_window = 0;
                        self.last_track_at = None;
                    }
                } else {
                    self.tracks_in_window = 0;
                    self.last_track_at = Some(now);
                }
            }
        }
    }

    /// Ensure a live session id exists.
    ///
    /// No current id: generate one (unix millis), clear session-scoped data,
    /// and arm the session-start flag. Existing id: re-persist it with a
    /// fresh sliding expiry and advance the track window.
    #[instrument(name = "session_refresh", skip(self))]
    pub fn refresh_session(&mut self) {
        match self.session_id() {
            None => {
                self.store.clear_session_data();
                let id = Utc::now().timestamp_millis().to_string();
                debug!(session_id = %id, "starting new session");
                self.should_start_session = true;
                self.persist_session_id(&id);
            }
            Some(id) => {
                self.record_track();
                self.persist_session_id(&id);
            }
        }
    }

    fn persist_session_id(&mut self, id: &str) {
        let mut data = Payload::new();
        data.insert(keys::SESSION_ID.to_string(), TrackValue::from(id));
        self.store.add(data, Expiration::Session);
    }

    /// Ask the backend for a new session, when delivery needs one.
    fn start_new_session(&self) {
        if self.tag_management_enabled && self.should_start_session {
            if let Some(starter) = &self.session_starter {
                debug!("requesting backend session start");
                starter.request_session();
            }
        }
    }
}
