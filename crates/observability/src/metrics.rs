//! Named metrics for the dispatch pipeline.
//!
//! Thin wrappers over the `metrics` facade so call sites stay one-liners and
//! metric names live in one place.

use metrics::{counter, gauge};

/// A track request entered the processing pipeline.
pub fn record_track_processed() {
    counter!("dispatch_tracks_processed_total").increment(1);
}

/// A request was persisted to the dispatch queue.
pub fn record_enqueued(reason: &str) {
    counter!("dispatch_enqueued_total", "reason" => reason.to_string()).increment(1);
}

/// A request was silently discarded by a validator.
pub fn record_dropped(validator: &str) {
    counter!("dispatch_dropped_total", "validator" => validator.to_string()).increment(1);
}

/// The persisted queue was wiped; `count` entries discarded.
pub fn record_purged(count: usize) {
    counter!("dispatch_purged_total").increment(count as u64);
}

/// Queued entries were released for delivery.
pub fn record_released(count: usize) {
    counter!("dispatch_released_total").increment(count as u64);
}

/// One dispatcher attempt finished.
pub fn record_dispatched(dispatcher: &str, success: bool) {
    counter!(
        "dispatch_attempts_total",
        "dispatcher" => dispatcher.to_string(),
        "outcome" => if success { "success" } else { "failure" },
    )
    .increment(1);
}

/// Current persisted queue depth.
pub fn record_queue_depth(depth: usize) {
    gauge!("dispatch_queue_depth").set(depth as f64);
}
