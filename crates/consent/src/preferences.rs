//! Consent status and category preferences.

use serde::{Deserialize, Serialize};

use contracts::{keys, Payload, TrackValue};

/// User consent state. Categories are meaningful only when the status is
/// not `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsentStatus {
    #[default]
    Unknown,
    Consented,
    NotConsented,
}

impl ConsentStatus {
    /// Wire value recorded under `tracking_consented`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Consented => "consented",
            Self::NotConsented => "notConsented",
        }
    }
}

/// Tracking purpose categories a user can consent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentCategory {
    Analytics,
    Affiliates,
    DisplayAds,
    Email,
    Personalization,
    Search,
    Social,
    BigData,
    Mobile,
    Engagement,
    Monitoring,
    Crm,
    Cdp,
    Cookiematch,
    Misc,
}

impl ConsentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analytics => "analytics",
            Self::Affiliates => "affiliates",
            Self::DisplayAds => "display_ads",
            Self::Email => "email",
            Self::Personalization => "personalization",
            Self::Search => "search",
            Self::Social => "social",
            Self::BigData => "big_data",
            Self::Mobile => "mobile",
            Self::Engagement => "engagement",
            Self::Monitoring => "monitoring",
            Self::Crm => "crm",
            Self::Cdp => "cdp",
            Self::Cookiematch => "cookiematch",
            Self::Misc => "misc",
        }
    }

    /// Every category; full consent with no explicit selection grants all.
    pub fn all() -> Vec<Self> {
        vec![
            Self::Analytics,
            Self::Affiliates,
            Self::DisplayAds,
            Self::Email,
            Self::Personalization,
            Self::Search,
            Self::Social,
            Self::BigData,
            Self::Mobile,
            Self::Engagement,
            Self::Monitoring,
            Self::Crm,
            Self::Cdp,
            Self::Cookiematch,
            Self::Misc,
        ]
    }
}

/// Persisted consent selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsentPreferences {
    pub status: ConsentStatus,
    #[serde(default)]
    pub categories: Vec<ConsentCategory>,
    /// Unix millis of the last status or category change.
    #[serde(default)]
    pub last_updated_ms: Option<i64>,
}

impl ConsentPreferences {
    /// Consent fields merged into outgoing track payloads.
    pub fn as_payload(&self) -> Payload {
        let categories: Vec<TrackValue> = match self.status {
            ConsentStatus::Consented => self
                .categories
                .iter()
                .map(|category| TrackValue::from(category.as_str()))
                .collect(),
            _ => Vec::new(),
        };
        let mut payload = Payload::new();
        payload.insert(
            keys::TRACKING_CONSENTED.to_string(),
            TrackValue::from(self.status.as_str()),
        );
        payload.insert(
            keys::CONSENT_CATEGORIES.to_string(),
            TrackValue::List(categories),
        );
        if let Some(updated) = self.last_updated_ms {
            payload.insert(
                keys::CONSENT_LAST_UPDATED.to_string(),
                TrackValue::String(updated.to_string()),
            );
        }
        payload
    }
}
