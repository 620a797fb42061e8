//! Tiered event data store with per-entry expiration.
//!
//! Three tiers merge into the "all event data" view: a durable file-backed
//! tier, a restart-scoped scratch map, and a session-scoped scratch map.
//! Later tiers win on key collision. Expired durable entries are never
//! served; pruning happens lazily on write and on the explicit sweep.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use contracts::{defaults, keys, merge, Payload, SdkConfig, TrackValue};

use crate::expiration::Expiration;

const STORE_FILE: &str = "event_data.json";

/// One stored entry. Identity is the key alone; inserting an existing key
/// replaces the prior entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDataItem {
    pub key: String,
    pub value: TrackValue,
    pub expires_ms: i64,
}

/// Durable + restart-scoped + session-scoped event data.
pub struct EventDataStore {
    path: PathBuf,
    durable: BTreeMap<String, EventDataItem>,
    restart_data: Payload,
    session_data: Payload,
    can_write: bool,
}

impl EventDataStore {
    /// Open the store under `data_dir`, pruning entries that expired while
    /// the process was down, and inject the static account fields.
    pub fn open(config: &SdkConfig, data_dir: &Path) -> Self {
        if let Err(e) = fs::create_dir_all(data_dir) {
            warn!(dir = %data_dir.display(), error = %e, "could not create data dir");
        }
        let path = data_dir.join(STORE_FILE);
        let mut store = Self {
            durable: load_items(&path),
            path,
            restart_data: Payload::new(),
            session_data: Payload::new(),
            can_write: true,
        };
        store.remove_expired();

        let mut static_data = Payload::new();
        static_data.insert(keys::ACCOUNT.to_string(), TrackValue::from(config.account.as_str()));
        static_data.insert(keys::PROFILE.to_string(), TrackValue::from(config.profile.as_str()));
        static_data.insert(
            keys::ENVIRONMENT.to_string(),
            TrackValue::from(config.environment.as_str()),
        );
        static_data.insert(
            keys::LIBRARY_NAME.to_string(),
            TrackValue::from(defaults::LIBRARY_NAME),
        );
        static_data.insert(
            keys::LIBRARY_VERSION.to_string(),
            TrackValue::from(defaults::LIBRARY_VERSION),
        );
        if let Some(datasource) = &config.datasource {
            static_data.insert(keys::DATASOURCE.to_string(), TrackValue::from(datasource.as_str()));
        }
        store.add(static_data, Expiration::UntilRestart);
        store
    }

    /// Upsert each key with the expiry computed from `expiration`.
    ///
    /// `Session` and `UntilRestart` entries also land in the matching
    /// scratch map so they are visible before the next disk flush and, for
    /// `UntilRestart`, for the remainder of this process only.
    pub fn add(&mut self, data: Payload, expiration: Expiration) {
        let expires_ms = expiration.expiry().timestamp_millis();
        match expiration {
            Expiration::Session => merge(&mut self.session_data, data.clone()),
            Expiration::UntilRestart => merge(&mut self.restart_data, data.clone()),
            _ => {}
        }
        for (key, value) in data {
            self.durable.insert(
                key.clone(),
                EventDataItem {
                    key,
                    value,
                    expires_ms,
                },
            );
        }
        self.flush();
    }

    /// Remove entries; missing keys are not an error.
    pub fn delete(&mut self, keys: &[&str]) {
        for key in keys {
            self.durable.remove(*key);
            self.restart_data.remove(*key);
            self.session_data.remove(*key);
        }
        self.flush();
    }

    pub fn delete_all(&mut self) {
        self.durable.clear();
        self.restart_data.clear();
        self.session_data.clear();
        self.flush();
    }

    /// Value for `key` if present in the durable tier and not expired.
    pub fn get_unexpired(&self, key: &str) -> Option<&TrackValue> {
        let now_ms = Utc::now().timestamp_millis();
        self.durable
            .get(key)
            .filter(|item| item.expires_ms > now_ms)
            .map(|item| &item.value)
    }

    /// The merged current view: durable (non-expired) -> restart -> session,
    /// later writer wins; plus a fresh jitter value and, when absent, one
    /// stable set of timestamp fields cached into the session tier.
    pub fn all_event_data(&mut self) -> Payload {
        let now_ms = Utc::now().timestamp_millis();
        let mut view = Payload::new();
        for item in self.durable.values() {
            if item.expires_ms > now_ms {
                view.insert(item.key.clone(), item.value.clone());
            }
        }
        merge(&mut view, self.restart_data.clone());
        merge(&mut view, self.session_data.clone());

        if !timestamps_exist(&view) {
            let stamps = current_timestamps();
            merge(&mut self.session_data, stamps.clone());
            merge(&mut view, stamps);
        }
        view.insert(
            keys::RANDOM.to_string(),
            TrackValue::String(rand::rng().random_range(1..=16i32).to_string()),
        );
        view
    }

    /// Prune expired durable entries; returns the number removed.
    pub fn remove_expired(&mut self) -> usize {
        let now_ms = Utc::now().timestamp_millis();
        let before = self.durable.len();
        self.durable.retain(|_, item| item.expires_ms > now_ms);
        let removed = before - self.durable.len();
        if removed > 0 {
            debug!(removed, "pruned expired event data");
            self.flush();
        }
        removed
    }

    /// Drop everything session-scoped (called when the session refreshes).
    pub fn clear_session_data(&mut self) {
        self.session_data.clear();
    }

    /// Whether the last flush reached disk.
    pub fn can_write(&self) -> bool {
        self.can_write
    }

    /// Persist the durable tier. Failures are logged and leave the
    /// in-memory view authoritative until the next successful flush.
    fn flush(&mut self) {
        let items: Vec<&EventDataItem> = self.durable.values().collect();
        match write_atomic(&self.path, &items) {
            Ok(()) => self.can_write = true,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "event data flush failed");
                self.can_write = false;
            }
        }
    }
}

fn load_items(path: &Path) -> BTreeMap<String, EventDataItem> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return BTreeMap::new(),
    };
    match serde_json::from_str::<Vec<EventDataItem>>(&content) {
        Ok(items) => items
            .into_iter()
            .map(|item| (item.key.clone(), item))
            .collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt event data file, starting empty");
            BTreeMap::new()
        }
    }
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let content = serde_json::to_vec(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}

fn timestamps_exist(data: &Payload) -> bool {
    [
        keys::TIMESTAMP_EPOCH,
        keys::TIMESTAMP,
        keys::TIMESTAMP_LOCAL,
        keys::TIMESTAMP_UNIX_MS,
        keys::TIMESTAMP_OFFSET,
    ]
    .iter()
    .all(|key| data.contains_key(*key))
}

fn current_timestamps() -> Payload {
    let utc = Utc::now();
    let local = Local::now();
    let offset_hours = local.offset().local_minus_utc() / 3600;

    let mut stamps = Payload::new();
    stamps.insert(
        keys::TIMESTAMP_EPOCH.to_string(),
        TrackValue::String(utc.timestamp().to_string()),
    );
    stamps.insert(
        keys::TIMESTAMP.to_string(),
        TrackValue::String(utc.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    stamps.insert(
        keys::TIMESTAMP_LOCAL.to_string(),
        TrackValue::String(local.to_rfc3339_opts(SecondsFormat::Millis, false)),
    );
    stamps.insert(
        keys::TIMESTAMP_UNIX_MS.to_string(),
        TrackValue::String(utc.timestamp_millis().to_string()),
    );
    stamps.insert(
        keys::TIMESTAMP_OFFSET.to_string(),
        TrackValue::String(offset_hours.to_string()),
    );
    stamps
}
