//! Expiration policy - maps an expiration class to a concrete expiry instant.

use chrono::{DateTime, Duration, Months, Utc};
use contracts::defaults;

/// Unit for custom expiration windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
    Months,
    Years,
}

/// Expiration class for stored event data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expiration {
    /// Valid for the session window (sliding, default 2 minutes).
    Session,
    /// Expired on the next cold start; the restart tier serves it until then.
    UntilRestart,
    /// Effectively unbounded.
    Forever,
    /// Explicit expiry instant.
    After(DateTime<Utc>),
    /// `n` units from now.
    Custom(TimeUnit, u32),
}

impl Expiration {
    /// Expiry instant relative to `now`.
    pub fn expiry_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::After(date) => *date,
            Self::Session => now + Duration::minutes(defaults::SESSION_WINDOW_MINUTES),
            Self::UntilRestart => now,
            Self::Forever => add_months(now, 12 * defaults::FOREVER_YEARS as u32),
            Self::Custom(unit, value) => match unit {
                TimeUnit::Minutes => now + Duration::minutes(i64::from(*value)),
                TimeUnit::Hours => now + Duration::hours(i64::from(*value)),
                TimeUnit::Days => now + Duration::days(i64::from(*value)),
                TimeUnit::Months => add_months(now, *value),
                TimeUnit::Years => add_months(now, value.saturating_mul(12)),
            },
        }
    }

    /// Expiry instant relative to the current time.
    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry_at(Utc::now())
    }
}

/// Calendar-aware month addition; saturates at the far end of chrono's range.
fn add_months(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
