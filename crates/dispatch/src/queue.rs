//! Durable FIFO of pending track requests.
//!
//! Entries are appended in arrival order and persisted as one JSON document,
//! rewritten atomically (temp file + rename) on every mutation so each
//! operation appears atomic to a reader. Trimming removes entries older than
//! a cutoff and independently caps the total count, oldest first.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use contracts::{Payload, TrackRequest};

const QUEUE_FILE: &str = "dispatch_queue.json";

/// One persisted request: the payload (already annotated with `was_queued`
/// and `queue_reason`) plus its enqueue instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentQueueEntry {
    pub data: Payload,
    pub enqueued_ms: i64,
}

/// Disk-backed dispatch queue, FIFO by append time.
pub struct PersistentDispatchQueue {
    path: PathBuf,
    entries: VecDeque<PersistentQueueEntry>,
    can_write: bool,
}

impl PersistentDispatchQueue {
    /// Open the queue under `data_dir`, restoring any persisted backlog.
    pub fn open(data_dir: &Path) -> Self {
        if let Err(e) = fs::create_dir_all(data_dir) {
            warn!(dir = %data_dir.display(), error = %e, "could not create data dir");
        }
        let path = data_dir.join(QUEUE_FILE);
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<PersistentQueueEntry>>(&content) {
                Ok(entries) => entries.into(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt queue file, starting empty");
                    VecDeque::new()
                }
            },
            Err(_) => VecDeque::new(),
        };
        Self {
            path,
            entries,
            can_write: true,
        }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Append a request, flushing before returning.
    pub fn append(&mut self, request: &TrackRequest) {
        self.entries.push_back(PersistentQueueEntry {
            data: request.data.clone(),
            enqueued_ms: Utc::now().timestamp_millis(),
        });
        self.flush();
    }

    /// Ordered, non-destructive view of the queue.
    pub fn peek(&self) -> Vec<TrackRequest> {
        self.entries
            .iter()
            .map(|entry| TrackRequest::new(entry.data.clone()))
            .collect()
    }

    /// The most recently queued request, if any.
    pub fn peek_last(&self) -> Option<TrackRequest> {
        self.entries
            .back()
            .map(|entry| TrackRequest::new(entry.data.clone()))
    }

    /// Remove and return everything, in enqueue order.
    pub fn dequeue_all(&mut self) -> Vec<TrackRequest> {
        let requests = self
            .entries
            .drain(..)
            .map(|entry| TrackRequest::new(entry.data))
            .collect();
        self.flush();
        requests
    }

    /// Discard everything; returns the number of entries removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.flush();
        removed
    }

    /// Drop entries enqueued before `cutoff_ms`, then cap the queue at
    /// `max_size` by discarding the oldest. Returns the number removed.
    pub fn trim_older_than(&mut self, cutoff_ms: i64, max_size: usize) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.enqueued_ms >= cutoff_ms);
        while self.entries.len() > max_size {
            self.entries.pop_front();
        }
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "trimmed dispatch queue");
            self.flush();
        }
        removed
    }

    /// Whether the last flush reached disk; consulted by the batching policy
    /// before offering to queue more work.
    pub fn can_write(&self) -> bool {
        self.can_write
    }

    fn flush(&mut self) {
        let entries: Vec<&PersistentQueueEntry> = self.entries.iter().collect();
        let result = serde_json::to_vec(&entries)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            .and_then(|content| {
                let tmp = self.path.with_extension("json.tmp");
                fs::write(&tmp, content)?;
                fs::rename(&tmp, &self.path)
            });
        match result {
            Ok(()) => self.can_write = true,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "queue flush failed");
                self.can_write = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{keys, payload, TrackValue};
    use tempfile::tempdir;

    fn request(event: &str) -> TrackRequest {
        TrackRequest::new(payload! { "event" => event })
    }

    #[test]
    fn test_fifo_order_preserved() {
        let dir = tempdir().unwrap();
        let mut queue = PersistentDispatchQueue::open(dir.path());
        for i in 0..5 {
            queue.append(&request(&format!("event_{i}")));
        }
        assert_eq!(queue.count(), 5);

        let drained = queue.dequeue_all();
        assert_eq!(queue.count(), 0);
        for (i, request) in drained.iter().enumerate() {
            assert_eq!(request.event(), Some(format!("event_{i}").as_str()));
        }
    }

    #[test]
    fn test_peek_is_non_destructive() {
        let dir = tempdir().unwrap();
        let mut queue = PersistentDispatchQueue::open(dir.path());
        queue.append(&request("a"));
        queue.append(&request("b"));
        assert_eq!(queue.peek().len(), 2);
        assert_eq!(queue.count(), 2);
        assert_eq!(queue.peek_last().unwrap().event(), Some("b"));
    }

    #[test]
    fn test_clear_empties_queue() {
        let dir = tempdir().unwrap();
        let mut queue = PersistentDispatchQueue::open(dir.path());
        queue.append(&request("a"));
        queue.append(&request("b"));
        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.count(), 0);
    }

    #[test]
    fn test_backlog_survives_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let mut queue = PersistentDispatchQueue::open(dir.path());
            let request = request("persisted");
            queue.append(&request);
            request.id
        };
        let queue = PersistentDispatchQueue::open(dir.path());
        assert_eq!(queue.count(), 1);
        let restored = queue.peek().remove(0);
        assert_eq!(restored.event(), Some("persisted"));
        // the generated id must survive the round trip
        assert_eq!(restored.id, id);
    }

    #[test]
    fn test_trim_by_age() {
        let dir = tempdir().unwrap();
        let mut queue = PersistentDispatchQueue::open(dir.path());
        queue.append(&request("old"));
        queue.append(&request("new"));
        // age out everything enqueued before "now + 1ms"
        let removed = queue.trim_older_than(Utc::now().timestamp_millis() + 1, 100);
        assert_eq!(removed, 2);
        assert_eq!(queue.count(), 0);
    }

    #[test]
    fn test_trim_by_size_keeps_newest() {
        let dir = tempdir().unwrap();
        let mut queue = PersistentDispatchQueue::open(dir.path());
        for i in 0..6 {
            queue.append(&request(&format!("event_{i}")));
        }
        let removed = queue.trim_older_than(0, 4);
        assert_eq!(removed, 2);
        let remaining = queue.peek();
        assert_eq!(remaining.len(), 4);
        assert_eq!(remaining[0].event(), Some("event_2"));
        assert_eq!(remaining[3].event(), Some("event_5"));
    }

    #[test]
    fn test_queued_annotations_survive() {
        let dir = tempdir().unwrap();
        let mut queue = PersistentDispatchQueue::open(dir.path());
        let mut queued = request("view");
        queued.insert(keys::WAS_QUEUED, TrackValue::from("true"));
        queued.insert(keys::QUEUE_REASON, TrackValue::from("connectivity"));
        queue.append(&queued);

        let restored = queue.dequeue_all().remove(0);
        assert!(restored.was_queued());
        assert_eq!(
            restored.data.get(keys::QUEUE_REASON).unwrap().as_str(),
            Some("connectivity")
        );
    }
}
