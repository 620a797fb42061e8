//! MemoryDispatcher - captures requests for inspection in tests and demos

use std::sync::{Arc, Mutex};

use contracts::{CoreError, DispatchRequest, EventDispatcher, Payload};

/// Dispatcher that records everything it is handed.
pub struct MemoryDispatcher {
    id: String,
    received: Arc<Mutex<Vec<DispatchRequest>>>,
    ready: bool,
    fail_sends: bool,
}

impl MemoryDispatcher {
    /// Create a capturing dispatcher; the returned handle sees every request
    /// the worker delivers.
    pub fn new(id: impl Into<String>) -> (Self, Arc<Mutex<Vec<DispatchRequest>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                id: id.into(),
                received: Arc::clone(&received),
                ready: true,
                fail_sends: false,
            },
            received,
        )
    }

    /// Variant that rejects every send with a non-success response.
    pub fn failing(id: impl Into<String>) -> (Self, Arc<Mutex<Vec<DispatchRequest>>>) {
        let (mut dispatcher, received) = Self::new(id);
        dispatcher.fail_sends = true;
        (dispatcher, received)
    }

    /// Variant that reports itself uninitialized.
    pub fn not_ready(id: impl Into<String>) -> (Self, Arc<Mutex<Vec<DispatchRequest>>>) {
        let (mut dispatcher, received) = Self::new(id);
        dispatcher.ready = false;
        (dispatcher, received)
    }
}

impl EventDispatcher for MemoryDispatcher {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&mut self, request: &DispatchRequest) -> Result<Option<Payload>, CoreError> {
        if !self.ready {
            return Err(CoreError::DestinationNotInitialized {
                dispatcher: self.id.clone(),
            });
        }
        if self.fail_sends {
            return Err(CoreError::non_success(&self.id, "simulated failure"));
        }
        if let DispatchRequest::Batch(batch) = request {
            if batch.is_empty() {
                return Err(CoreError::InvalidBatch);
            }
        }
        self.received
            .lock()
            .expect("memory dispatcher lock")
            .push(request.clone());
        Ok(None)
    }
}
