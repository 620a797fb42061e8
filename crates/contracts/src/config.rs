//! SDK configuration surface consumed by the dispatch core.
//!
//! Values are stored exactly as supplied; invalid thresholds fall back to
//! defaults at the `effective_*` accessors so the stored config always
//! mirrors the caller's input.

use serde::{Deserialize, Serialize};

/// Built-in policy defaults.
pub mod defaults {
    /// Queue entries kept when trimming (e.g. while offline).
    pub const MAX_QUEUE_SIZE: usize = 20;
    /// Hard cap on events per dispatched batch.
    pub const MAX_BATCH_SIZE: usize = 10;
    pub const BATCH_SIZE: usize = 10;
    pub const EVENTS_BEFORE_AUTO_DISPATCH: usize = 10;
    pub const BATCH_EXPIRATION_DAYS: i64 = 7;
    /// Sliding expiry window for session-scoped event data.
    pub const SESSION_WINDOW_MINUTES: i64 = 2;
    /// Two tracks inside this window roll a new session.
    pub const SECONDS_BETWEEN_TRACK_EVENTS: u64 = 30;
    /// Below this percentage, battery saver routes events to the queue.
    pub const LOW_BATTERY_THRESHOLD: f64 = 20.0;
    /// Battery level reported by simulators; always treated as sufficient.
    pub const SIMULATOR_BATTERY_LEVEL: f64 = -100.0;
    /// Horizon used for `forever` expiration.
    pub const FOREVER_YEARS: i64 = 100;

    pub const LIBRARY_NAME: &str = "rust";
    pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Configuration supplied by the embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    pub account: String,
    pub profile: String,
    pub environment: String,
    #[serde(default)]
    pub datasource: Option<String>,

    /// Raw configured queue limit; `<= 0` resolves to the default.
    #[serde(default)]
    pub max_queue_size: Option<i64>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_auto_dispatch")]
    pub events_before_auto_dispatch: usize,
    #[serde(default = "default_true")]
    pub batching_enabled: bool,
    #[serde(default)]
    pub batching_bypass_events: Vec<String>,
    #[serde(default = "default_expiration_days")]
    pub batch_expiration_days: i64,
    #[serde(default)]
    pub battery_saver_enabled: bool,

    #[serde(default = "default_track_seconds")]
    pub seconds_between_track_events: u64,
    #[serde(default)]
    pub tag_management_enabled: bool,
}

fn default_batch_size() -> usize {
    defaults::BATCH_SIZE
}

fn default_auto_dispatch() -> usize {
    defaults::EVENTS_BEFORE_AUTO_DISPATCH
}

fn default_true() -> bool {
    true
}

fn default_expiration_days() -> i64 {
    defaults::BATCH_EXPIRATION_DAYS
}

fn default_track_seconds() -> u64 {
    defaults::SECONDS_BETWEEN_TRACK_EVENTS
}

impl SdkConfig {
    pub fn new(
        account: impl Into<String>,
        profile: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            profile: profile.into(),
            environment: environment.into(),
            datasource: None,
            max_queue_size: None,
            batch_size: defaults::BATCH_SIZE,
            events_before_auto_dispatch: defaults::EVENTS_BEFORE_AUTO_DISPATCH,
            batching_enabled: true,
            batching_bypass_events: Vec::new(),
            batch_expiration_days: defaults::BATCH_EXPIRATION_DAYS,
            battery_saver_enabled: false,
            seconds_between_track_events: defaults::SECONDS_BETWEEN_TRACK_EVENTS,
            tag_management_enabled: false,
        }
    }

    /// Configured queue limit, falling back to the default when the caller
    /// supplied zero or a negative value.
    pub fn effective_max_queue_size(&self) -> usize {
        match self.max_queue_size {
            Some(limit) if limit > 0 => limit as usize,
            _ => defaults::MAX_QUEUE_SIZE,
        }
    }

    /// Batch chunk size, clamped to `1..=MAX_BATCH_SIZE`.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, defaults::MAX_BATCH_SIZE)
    }

    pub fn effective_batch_expiration_days(&self) -> i64 {
        if self.batch_expiration_days > 0 {
            self.batch_expiration_days
        } else {
            defaults::BATCH_EXPIRATION_DAYS
        }
    }
}
