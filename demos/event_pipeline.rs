//! Event Pipeline Example
//!
//! Demonstrates wiring the full dispatch core: config, event store, session
//! tracking, consent gating, and delivery fan-out to a log dispatcher.
//!
//! Run with: cargo run --bin event_pipeline [config_path]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use config_loader::{ConfigFormat, ConfigLoader};
use consent::{ConsentManager, ConsentStatus};
use contracts::payload;
use dispatch::{
    DispatchManagerBuilder, DispatcherHandle, LogDispatcher, SharedConnectivity,
};
use event_store::{EventDataStore, Expiration, SessionTracker};
use observability::{LogFormat, ObservabilityConfig};
use tracing::info;

const DEFAULT_CONFIG: &str = r#"
[account]
account = "demo"
profile = "main"
environment = "dev"

[dispatch]
batch_size = 5
events_before_auto_dispatch = 5

[logging]
format = "pretty"
level = "info"
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ==== Stage 1: Load config ====
    let file = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => ConfigLoader::load_from_path(&path)?,
        None => ConfigLoader::load_from_str(DEFAULT_CONFIG, ConfigFormat::Toml)?,
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: match file.logging.format.as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        },
        metrics_port: file.logging.metrics_port,
        default_log_level: file.logging.level.clone(),
    })?;

    let config = file.into_sdk_config();
    info!(account = %config.account, profile = %config.profile, "Config loaded");

    // ==== Stage 2: Event store + session tracking ====
    let data_dir = tempfile::tempdir()?;
    let mut store = EventDataStore::open(&config, data_dir.path());
    store.add(payload! { "visitor_id" => "demo-visitor" }, Expiration::Forever);
    let sessions = SessionTracker::new(store, &config, None);

    // ==== Stage 3: Consent gate + dispatch manager ====
    let consent = Arc::new(ConsentManager::new());
    let (handle, join) = DispatchManagerBuilder::new(config, data_dir.path())
        .validator(consent.clone())
        .dispatcher(DispatcherHandle::spawn(LogDispatcher::new("log"), 50))
        .spawn(SharedConnectivity::online(), sessions);
    consent.set_delegate(Arc::new(handle.clone()));

    // ==== Stage 4: Drive some traffic ====
    info!("Tracking while consent is undetermined; events will queue");
    for i in 0..3 {
        handle.track(payload! { "event" => "screen_view", "screen" => format!("home_{i}") });
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    info!(queued = handle.queue_count().await, "Backlog while unknown");

    info!("Granting consent; backlog should release as one batch");
    consent.set_status(ConsentStatus::Consented);
    tokio::time::sleep(Duration::from_millis(100)).await;
    info!(queued = handle.queue_count().await, "Backlog after grant");

    info!("Tracking a lifecycle event; it bypasses batching");
    handle.track(payload! { "event" => "wake" });

    info!("Tracking five more events to trip auto-dispatch");
    for i in 0..5 {
        handle.track(payload! { "event" => "scroll", "depth" => i as i64 });
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    info!(queued = handle.queue_count().await, "Final queue depth");

    handle.shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
    info!("Demo complete");
    Ok(())
}
