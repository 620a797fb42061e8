//! Consent gate - dispatch validator over user consent state.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::{debug, info, warn};

use contracts::{
    events, keys, merge, DispatchValidator, Payload, QueueDelegate, TrackRequest, TrackValue,
};

use crate::preferences::{ConsentCategory, ConsentPreferences, ConsentStatus};

/// Validator identifier used in dispatch manager logs.
pub const VALIDATOR_ID: &str = "consent_gate";

const PREFS_FILE: &str = "consent_preferences.json";

/// Consent state machine, shared between the embedding application (which
/// mutates it) and the dispatch manager (which consults it as a validator).
pub struct ConsentManager {
    preferences: RwLock<ConsentPreferences>,
    delegate: RwLock<Option<Arc<dyn QueueDelegate>>>,
    path: Option<PathBuf>,
}

impl ConsentManager {
    /// In-memory manager starting from `Unknown`.
    pub fn new() -> Self {
        Self {
            preferences: RwLock::new(ConsentPreferences::default()),
            delegate: RwLock::new(None),
            path: None,
        }
    }

    /// Manager persisting preferences under `data_dir`, restoring any prior
    /// selection.
    pub fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(PREFS_FILE);
        let preferences = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(preferences) => preferences,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt consent file, starting unknown");
                    ConsentPreferences::default()
                }
            },
            Err(_) => ConsentPreferences::default(),
        };
        Self {
            preferences: RwLock::new(preferences),
            delegate: RwLock::new(None),
            path: Some(path),
        }
    }

    /// Wire the queue-release seam. Called once at composition time.
    pub fn set_delegate(&self, delegate: Arc<dyn QueueDelegate>) {
        *self.delegate.write().expect("consent delegate lock") = Some(delegate);
    }

    pub fn status(&self) -> ConsentStatus {
        self.read().status
    }

    pub fn categories(&self) -> Vec<ConsentCategory> {
        self.read().categories
    }

    pub fn preferences(&self) -> ConsentPreferences {
        self.read()
    }

    /// Set the consent status. Granting consent with no explicit category
    /// selection grants every category. A transition out of `Unknown` or
    /// `NotConsented` into `Consented` asks the dispatch manager to flush
    /// whatever accumulated while consent was undetermined.
    pub fn set_status(&self, status: ConsentStatus) {
        let granted = {
            let mut preferences = self.preferences.write().expect("consent prefs lock");
            let previous = preferences.status;
            preferences.status = status;
            match status {
                ConsentStatus::Consented => {
                    if preferences.categories.is_empty() {
                        preferences.categories = ConsentCategory::all();
                    }
                }
                _ => preferences.categories.clear(),
            }
            preferences.last_updated_ms = Some(Utc::now().timestamp_millis());
            self.persist(&preferences);
            info!(from = previous.as_str(), to = status.as_str(), "consent status changed");
            previous != ConsentStatus::Consented && status == ConsentStatus::Consented
        };
        if granted {
            self.request_release();
        }
    }

    /// Select consent categories; implies `Consented`.
    pub fn set_categories(&self, categories: Vec<ConsentCategory>) {
        let granted = {
            let mut preferences = self.preferences.write().expect("consent prefs lock");
            let previous = preferences.status;
            preferences.status = ConsentStatus::Consented;
            preferences.categories = categories;
            preferences.last_updated_ms = Some(Utc::now().timestamp_millis());
            self.persist(&preferences);
            previous != ConsentStatus::Consented
        };
        if granted {
            self.request_release();
        }
    }

    /// Return to `Unknown` with no categories. Does not purge queued data.
    pub fn reset_preferences(&self) {
        let mut preferences = self.preferences.write().expect("consent prefs lock");
        preferences.status = ConsentStatus::Unknown;
        preferences.categories.clear();
        preferences.last_updated_ms = Some(Utc::now().timestamp_millis());
        self.persist(&preferences);
        info!("consent preferences reset");
    }

    fn read(&self) -> ConsentPreferences {
        self.preferences.read().expect("consent prefs lock").clone()
    }

    fn persist(&self, preferences: &ConsentPreferences) {
        let Some(path) = &self.path else { return };
        let result = serde_json::to_vec(preferences)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            .and_then(|content| {
                let tmp = path.with_extension("json.tmp");
                fs::write(&tmp, content)?;
                fs::rename(&tmp, path)
            });
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "consent preferences flush failed");
        }
    }

    fn request_release(&self) {
        let delegate = self.delegate.read().expect("consent delegate lock").clone();
        if let Some(delegate) = delegate {
            debug!("consent granted, requesting queue release");
            delegate.request_release("consent status changed");
        }
    }

    fn is_audit(request: &TrackRequest) -> bool {
        request
            .event()
            .map(|event| events::CONSENT_AUDIT.contains(&event))
            .unwrap_or(false)
    }
}

impl Default for ConsentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchValidator for ConsentManager {
    fn id(&self) -> &str {
        VALIDATOR_ID
    }

    fn should_queue(&self, request: &TrackRequest) -> (bool, Option<Payload>) {
        // consent-lifecycle audit events always pass straight through
        if Self::is_audit(request) {
            return (false, None);
        }
        let preferences = self.read();
        match preferences.status {
            ConsentStatus::Unknown => {
                let mut info = Payload::new();
                info.insert(
                    keys::QUEUE_REASON.to_string(),
                    TrackValue::from(keys::queue_reason::CONSENT),
                );
                merge(&mut info, preferences.as_payload());
                (true, Some(info))
            }
            ConsentStatus::Consented | ConsentStatus::NotConsented => {
                (false, Some(preferences.as_payload()))
            }
        }
    }

    fn should_drop(&self, request: &TrackRequest) -> bool {
        !Self::is_audit(request) && self.status() == ConsentStatus::NotConsented
    }

    fn should_purge(&self, _request: &TrackRequest) -> bool {
        self.status() == ConsentStatus::NotConsented
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::payload;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn track(event: &str) -> TrackRequest {
        TrackRequest::new(payload! { "event" => event })
    }

    fn info_str<'a>(info: &'a Payload, key: &str) -> Option<&'a str> {
        info.get(key).and_then(TrackValue::as_str)
    }

    #[test]
    fn test_audit_events_bypass_gating_in_every_state() {
        let manager = ConsentManager::new();
        for status in [
            ConsentStatus::Unknown,
            ConsentStatus::Consented,
            ConsentStatus::NotConsented,
        ] {
            manager.set_status(status);
            for event in events::CONSENT_AUDIT {
                let request = track(event);
                let (queue, info) = manager.should_queue(&request);
                assert!(!queue, "audit event {event} queued under {status:?}");
                assert!(info.is_none());
                assert!(!manager.should_drop(&request), "audit event {event} dropped");
            }
        }
    }

    #[test]
    fn test_unknown_queues_with_reason() {
        let manager = ConsentManager::new();
        let (queue, info) = manager.should_queue(&track("view"));
        assert!(queue);
        let info = info.unwrap();
        assert_eq!(info_str(&info, keys::QUEUE_REASON), Some("consentmanager"));
        assert_eq!(info_str(&info, keys::TRACKING_CONSENTED), Some("unknown"));
        match info.get(keys::CONSENT_CATEGORIES).unwrap() {
            TrackValue::List(list) => assert!(list.is_empty()),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_consented_passes_with_categories() {
        let manager = ConsentManager::new();
        manager.set_status(ConsentStatus::Consented);
        let (queue, info) = manager.should_queue(&track("view"));
        assert!(!queue);
        let info = info.unwrap();
        assert_eq!(info_str(&info, keys::TRACKING_CONSENTED), Some("consented"));
        match info.get(keys::CONSENT_CATEGORIES).unwrap() {
            TrackValue::List(list) => assert_eq!(list.len(), 15),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_not_consented_drops_and_purges() {
        let manager = ConsentManager::new();
        manager.set_status(ConsentStatus::NotConsented);
        let request = track("view");
        let (queue, info) = manager.should_queue(&request);
        assert!(!queue);
        assert_eq!(
            info_str(&info.unwrap(), keys::TRACKING_CONSENTED),
            Some("notConsented")
        );
        assert!(manager.should_drop(&request));
        assert!(manager.should_purge(&request));
    }

    #[test]
    fn test_granting_consent_releases_queue_once() {
        struct Counting(AtomicUsize);
        impl QueueDelegate for Counting {
            fn request_release(&self, _reason: &str) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let manager = ConsentManager::new();
        let delegate = Arc::new(Counting(AtomicUsize::new(0)));
        manager.set_delegate(delegate.clone());

        manager.set_status(ConsentStatus::NotConsented);
        assert_eq!(delegate.0.load(Ordering::SeqCst), 0);
        manager.set_status(ConsentStatus::Consented);
        assert_eq!(delegate.0.load(Ordering::SeqCst), 1);
        // already consented; no further release
        manager.set_status(ConsentStatus::Consented);
        assert_eq!(delegate.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_returns_to_unknown_without_release() {
        let manager = ConsentManager::new();
        manager.set_status(ConsentStatus::Consented);
        manager.reset_preferences();
        assert_eq!(manager.status(), ConsentStatus::Unknown);
        assert!(manager.categories().is_empty());
    }

    #[test]
    fn test_explicit_categories_survive_grant() {
        let manager = ConsentManager::new();
        manager.set_categories(vec![ConsentCategory::Analytics, ConsentCategory::Email]);
        assert_eq!(manager.status(), ConsentStatus::Consented);
        assert_eq!(manager.categories().len(), 2);
    }

    #[test]
    fn test_preferences_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let manager = ConsentManager::open(dir.path());
            manager.set_status(ConsentStatus::Consented);
        }
        let reopened = ConsentManager::open(dir.path());
        assert_eq!(reopened.status(), ConsentStatus::Consented);
        assert_eq!(reopened.categories().len(), 15);
    }
}
