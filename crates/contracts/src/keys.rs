//! Canonical payload key names and queue reasons.

pub const EVENT: &str = "event";
pub const REQUEST_ID: &str = "request_id";
pub const WAS_QUEUED: &str = "was_queued";
pub const QUEUE_REASON: &str = "queue_reason";
pub const BYPASS_QUEUE: &str = "bypass_queue";
pub const SESSION_ID: &str = "session_id";

pub const ACCOUNT: &str = "account";
pub const PROFILE: &str = "profile";
pub const ENVIRONMENT: &str = "environment";
pub const DATASOURCE: &str = "datasource";
pub const LIBRARY_NAME: &str = "library_name";
pub const LIBRARY_VERSION: &str = "library_version";

pub const RANDOM: &str = "random";
pub const TIMESTAMP_EPOCH: &str = "timestamp_epoch";
pub const TIMESTAMP: &str = "timestamp";
pub const TIMESTAMP_LOCAL: &str = "timestamp_local";
pub const TIMESTAMP_UNIX_MS: &str = "timestamp_unix_ms";
pub const TIMESTAMP_OFFSET: &str = "timestamp_offset";

pub const BATTERY_PERCENT: &str = "battery_percent";

pub const TRACKING_CONSENTED: &str = "tracking_consented";
pub const CONSENT_CATEGORIES: &str = "consent_categories";
pub const CONSENT_LAST_UPDATED: &str = "consent_last_updated";

/// Queue reasons recorded under [`QUEUE_REASON`] when a request is persisted.
pub mod queue_reason {
    pub const BATCHING_ENABLED: &str = "batching_enabled";
    pub const CONNECTIVITY: &str = "connectivity";
    pub const CONSENT: &str = "consentmanager";
    pub const DISPATCHERS_NOT_READY: &str = "dispatchers not ready";
    pub const INSUFFICIENT_BATTERY: &str = "insufficient battery";
}
