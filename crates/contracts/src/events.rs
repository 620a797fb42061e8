//! Well-known event names with special routing rules.

pub const LAUNCH: &str = "launch";
pub const WAKE: &str = "wake";
pub const SLEEP: &str = "sleep";
pub const KILL_VISITOR_SESSION: &str = "kill_visitor_session";

pub const CONSENT_GRANTED: &str = "consent_granted";
pub const CONSENT_DECLINED: &str = "consent_declined";
pub const CONSENT_PARTIAL: &str = "consent_partial";
pub const UPDATE_CONSENT_COOKIE: &str = "update_consent_cookie";

/// Events that always skip the batching queue, regardless of configuration.
/// User-configured bypass names are appended to this set.
pub const BATCHING_BYPASS: &[&str] = &[
    LAUNCH,
    WAKE,
    SLEEP,
    KILL_VISITOR_SESSION,
    CONSENT_GRANTED,
    CONSENT_DECLINED,
    CONSENT_PARTIAL,
    UPDATE_CONSENT_COOKIE,
];

/// Consent-lifecycle audit events; never gated by the consent validator so
/// the backend always sees them.
pub const CONSENT_AUDIT: &[&str] = &[
    CONSENT_GRANTED,
    CONSENT_DECLINED,
    CONSENT_PARTIAL,
    UPDATE_CONSENT_COOKIE,
];
