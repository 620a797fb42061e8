//! # Integration Tests
//!
//! End-to-end tests wiring real components with mock edges:
//! store -> session tracker -> dispatch manager -> dispatchers.

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use consent::{ConsentManager, ConsentStatus};
    use contracts::{keys, payload, DispatchRequest, SdkConfig};
    use dispatch::{
        DispatchHandle, DispatchManagerBuilder, DispatcherHandle, MemoryDispatcher,
        SharedConnectivity,
    };
    use event_store::{EventDataStore, SessionTracker};
    use tokio::task::JoinHandle;

    type Received = Arc<Mutex<Vec<DispatchRequest>>>;

    fn spawn_pipeline(
        dir: &Path,
        config: SdkConfig,
        connectivity: SharedConnectivity,
        consent: Option<Arc<ConsentManager>>,
    ) -> (DispatchHandle, Received, JoinHandle<()>) {
        let store = EventDataStore::open(&config, dir);
        let sessions = SessionTracker::new(store, &config, None);
        let (dispatcher, received) = MemoryDispatcher::new("memory");

        let mut builder = DispatchManagerBuilder::new(config, dir)
            .dispatcher(DispatcherHandle::spawn(dispatcher, 50));
        if let Some(consent) = &consent {
            builder = builder.validator(consent.clone());
        }
        let (handle, join) = builder.spawn(connectivity, sessions);
        if let Some(consent) = consent {
            consent.set_delegate(Arc::new(handle.clone()));
        }
        (handle, received, join)
    }

    /// Wait until all previously submitted commands are processed.
    async fn settle(handle: &DispatchHandle) -> usize {
        let count = handle.queue_count().await;
        // give dispatcher workers time to drain
        tokio::time::sleep(Duration::from_millis(50)).await;
        count
    }

    fn event(name: &str) -> contracts::Payload {
        payload! { "event" => name }
    }

    /// Scenario: batching disabled, online, ready dispatcher. The request is
    /// delivered immediately and nothing is persisted.
    #[tokio::test]
    async fn test_immediate_dispatch_when_batching_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SdkConfig::new("acme", "main", "dev");
        config.batching_enabled = false;
        let (handle, received, join) =
            spawn_pipeline(dir.path(), config, SharedConnectivity::online(), None);

        handle.track(event("view"));
        let queued = settle(&handle).await;
        assert_eq!(queued, 0);

        let received = received.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        match &received[0] {
            DispatchRequest::Track(track) => {
                assert_eq!(track.event(), Some("view"));
                // enrichment fields rode along
                assert_eq!(track.data[keys::ACCOUNT].as_str(), Some("acme"));
                assert!(track.data.contains_key(keys::SESSION_ID));
                assert!(track.data.contains_key(keys::TIMESTAMP_UNIX_MS));
            }
            other => panic!("expected single track, got {other:?}"),
        }

        handle.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
    }

    /// Scenario: batching five-by-five. The fifth event auto-releases the
    /// queue as one batch of five, restoring the count to zero.
    #[tokio::test]
    async fn test_auto_dispatch_releases_one_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SdkConfig::new("acme", "main", "dev");
        config.batch_size = 5;
        config.events_before_auto_dispatch = 5;
        let (handle, received, join) =
            spawn_pipeline(dir.path(), config, SharedConnectivity::online(), None);

        for _ in 0..5 {
            handle.track(event("hello"));
        }
        let queued = settle(&handle).await;
        assert_eq!(queued, 0);

        let received = received.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        match &received[0] {
            DispatchRequest::Batch(batch) => {
                assert_eq!(batch.len(), 5);
                for member in &batch.requests {
                    assert_eq!(member.event(), Some("hello"));
                    assert!(member.was_queued());
                }
            }
            other => panic!("expected batch, got {other:?}"),
        }

        handle.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
    }

    /// Scenario: "wake" is in the built-in bypass set; it skips the batching
    /// queue even with batching enabled.
    #[tokio::test]
    async fn test_builtin_bypass_event_skips_queue() {
        let dir = tempfile::tempdir().unwrap();
        let config = SdkConfig::new("acme", "main", "dev");
        let (handle, received, join) =
            spawn_pipeline(dir.path(), config, SharedConnectivity::online(), None);

        handle.track(event("wake"));
        let queued = settle(&handle).await;
        assert_eq!(queued, 0);
        assert_eq!(received.lock().unwrap().len(), 1);

        // a regular event still queues
        handle.track(event("scroll"));
        let queued = settle(&handle).await;
        assert_eq!(queued, 1);
        assert_eq!(received.lock().unwrap().len(), 1);

        handle.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
    }

    /// Scenario: backlog accumulated while consent was undetermined is
    /// released exactly once, in original order, when consent is granted.
    #[tokio::test]
    async fn test_consent_grant_releases_backlog_once_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = SdkConfig::new("acme", "main", "dev");
        let consent = Arc::new(ConsentManager::new());
        let (handle, received, join) = spawn_pipeline(
            dir.path(),
            config,
            SharedConnectivity::online(),
            Some(consent.clone()),
        );

        for name in ["first", "second", "third"] {
            handle.track(event(name));
        }
        let queued = settle(&handle).await;
        assert_eq!(queued, 3);
        assert!(
            received.lock().unwrap().is_empty(),
            "nothing should deliver while consent unknown"
        );

        consent.set_status(ConsentStatus::NotConsented);
        consent.set_status(ConsentStatus::Consented);
        let queued = settle(&handle).await;
        assert_eq!(queued, 0);

        let received = received.lock().unwrap().clone();
        assert_eq!(received.len(), 1, "backlog must release exactly once");
        match &received[0] {
            DispatchRequest::Batch(batch) => {
                let order: Vec<_> = batch
                    .requests
                    .iter()
                    .map(|request| request.event().unwrap().to_string())
                    .collect();
                assert_eq!(order, ["first", "second", "third"]);
                for member in &batch.requests {
                    assert_eq!(
                        member.data[keys::QUEUE_REASON].as_str(),
                        Some("consentmanager")
                    );
                    assert_eq!(
                        member.data[keys::TRACKING_CONSENTED].as_str(),
                        Some("unknown")
                    );
                }
            }
            other => panic!("expected batch, got {other:?}"),
        }

        handle.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
    }

    /// Consent declined: non-audit events are silently discarded, never
    /// persisted, never delivered.
    #[tokio::test]
    async fn test_not_consented_drops_events() {
        let dir = tempfile::tempdir().unwrap();
        let config = SdkConfig::new("acme", "main", "dev");
        let consent = Arc::new(ConsentManager::new());
        consent.set_status(ConsentStatus::NotConsented);
        let (handle, received, join) = spawn_pipeline(
            dir.path(),
            config,
            SharedConnectivity::online(),
            Some(consent.clone()),
        );

        handle.track(event("view"));
        let queued = settle(&handle).await;
        assert_eq!(queued, 0);
        assert!(received.lock().unwrap().is_empty());

        handle.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
    }

    /// Offline events persist with the connectivity reason; a restored
    /// connection flushes them. A single released entry arrives flagged to
    /// bypass the queue so it is not re-queued.
    #[tokio::test]
    async fn test_connection_restored_flushes_backlog() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SdkConfig::new("acme", "main", "dev");
        config.batching_enabled = false;
        let connectivity = SharedConnectivity::offline();
        let (handle, received, join) =
            spawn_pipeline(dir.path(), config, connectivity.clone(), None);

        handle.track(event("view"));
        let queued = settle(&handle).await;
        assert_eq!(queued, 1);
        assert!(received.lock().unwrap().is_empty());

        connectivity.set_connected(true);
        handle.connection_restored();
        let queued = settle(&handle).await;
        assert_eq!(queued, 0);

        let received = received.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        match &received[0] {
            DispatchRequest::Track(track) => {
                assert!(track.bypass_queue());
                assert_eq!(
                    track.data[keys::QUEUE_REASON].as_str(),
                    Some("connectivity")
                );
            }
            other => panic!("expected single track, got {other:?}"),
        }

        handle.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
    }

    /// One failing dispatcher neither blocks nor rolls back its peer.
    #[tokio::test]
    async fn test_dispatcher_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SdkConfig::new("acme", "main", "dev");
        config.batching_enabled = false;

        let store = EventDataStore::open(&config, dir.path());
        let sessions = SessionTracker::new(store, &config, None);
        let (healthy, healthy_received) = MemoryDispatcher::new("healthy");
        let (failing, failing_received) = MemoryDispatcher::failing("failing");

        let (handle, join) = DispatchManagerBuilder::new(config, dir.path())
            .dispatcher(DispatcherHandle::spawn(failing, 50))
            .dispatcher(DispatcherHandle::spawn(healthy, 50))
            .spawn(SharedConnectivity::online(), sessions);

        handle.track(event("view"));
        settle(&handle).await;

        assert!(failing_received.lock().unwrap().is_empty());
        assert_eq!(healthy_received.lock().unwrap().len(), 1);

        handle.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
    }

    /// A queued backlog survives a full restart of the pipeline and is
    /// released by the new instance.
    #[tokio::test]
    async fn test_backlog_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SdkConfig::new("acme", "main", "dev");
        config.batching_enabled = false;

        {
            let (handle, _received, join) = spawn_pipeline(
                dir.path(),
                config.clone(),
                SharedConnectivity::offline(),
                None,
            );
            handle.track(event("held"));
            assert_eq!(settle(&handle).await, 1);
            handle.shutdown();
            let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
        }

        let (handle, received, join) =
            spawn_pipeline(dir.path(), config, SharedConnectivity::online(), None);
        assert_eq!(handle.queue_count().await, 1);
        handle.release_queue("restart recovery");
        let queued = settle(&handle).await;
        assert_eq!(queued, 0);
        assert_eq!(received.lock().unwrap().len(), 1);

        handle.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
    }

    /// Audit events pass the consent gate even while declined.
    #[tokio::test]
    async fn test_audit_event_delivered_while_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let config = SdkConfig::new("acme", "main", "dev");
        let consent = Arc::new(ConsentManager::new());
        let (handle, received, join) = spawn_pipeline(
            dir.path(),
            config,
            SharedConnectivity::online(),
            Some(consent.clone()),
        );

        // consent unknown: audit event must go straight through
        handle.track(event("update_consent_cookie"));
        let queued = settle(&handle).await;
        assert_eq!(queued, 0);
        assert_eq!(received.lock().unwrap().len(), 1);

        handle.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
    }

    /// Config documents load from TOML and drive the pipeline.
    #[tokio::test]
    async fn test_config_file_drives_pipeline() {
        use config_loader::{ConfigFormat, ConfigLoader};

        let content = r#"
[account]
account = "acme"
profile = "main"
environment = "dev"

[dispatch]
batching_enabled = false
"#;
        let config = ConfigLoader::load_from_str(content, ConfigFormat::Toml)
            .unwrap()
            .into_sdk_config();

        let dir = tempfile::tempdir().unwrap();
        let (handle, received, join) =
            spawn_pipeline(dir.path(), config, SharedConnectivity::online(), None);
        handle.track(event("view"));
        assert_eq!(settle(&handle).await, 0);
        assert_eq!(received.lock().unwrap().len(), 1);

        handle.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
    }

    /// Queued payloads carry the persisted-record annotations.
    #[tokio::test]
    async fn test_persisted_record_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = SdkConfig::new("acme", "main", "dev");
        let (handle, _received, join) =
            spawn_pipeline(dir.path(), config.clone(), SharedConnectivity::online(), None);

        handle.track(event("view"));
        assert_eq!(settle(&handle).await, 1);
        handle.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), join).await;

        // inspect what actually hit the disk
        let queue = dispatch::PersistentDispatchQueue::open(dir.path());
        let persisted = queue.peek().remove(0);
        assert_eq!(persisted.data[keys::WAS_QUEUED].as_str(), Some("true"));
        assert_eq!(
            persisted.data[keys::QUEUE_REASON].as_str(),
            Some("batching_enabled")
        );
    }
}
