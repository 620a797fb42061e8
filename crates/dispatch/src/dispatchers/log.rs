//! LogDispatcher - logs request summaries via tracing

use tracing::{info, instrument};

use contracts::{CoreError, DispatchRequest, EventDispatcher, Payload};

/// Dispatcher that logs payload summaries for debugging
pub struct LogDispatcher {
    id: String,
}

impl LogDispatcher {
    /// Create a new LogDispatcher with the given name
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl EventDispatcher for LogDispatcher {
    fn id(&self) -> &str {
        &self.id
    }

    #[instrument(
        name = "log_dispatcher_send",
        skip(self, request),
        fields(dispatcher = %self.id)
    )]
    async fn send(&mut self, request: &DispatchRequest) -> Result<Option<Payload>, CoreError> {
        match request {
            DispatchRequest::Track(track) => {
                info!(
                    dispatcher = %self.id,
                    request_id = %track.id,
                    event = %track.event().unwrap_or(""),
                    queued = track.was_queued(),
                    "track request received"
                );
                Ok(None)
            }
            DispatchRequest::Batch(batch) => {
                let compressed = batch.compressed().ok_or(CoreError::InvalidBatch)?;
                info!(
                    dispatcher = %self.id,
                    batch_id = %batch.id,
                    events = batch.len(),
                    "batch request received"
                );
                Ok(Some(compressed))
            }
        }
    }
}
