//! EventDispatcher trait - delivery backend interface
//!
//! Defines the abstract interface for delivery backends. The core only calls
//! this; it never implements the transport itself.

use crate::error::CoreError;
use crate::request::DispatchRequest;
use crate::value::Payload;

/// Delivery backend trait
///
/// All dispatcher implementations must implement this trait.
#[trait_variant::make(EventDispatcher: Send)]
pub trait LocalEventDispatcher {
    /// Dispatcher name (used for logging/metrics)
    fn id(&self) -> &str;

    /// Deliver a single or batched payload
    ///
    /// # Errors
    /// Returns a delivery error scoped to this attempt; the optional payload
    /// carries backend-specific response info.
    async fn send(&mut self, request: &DispatchRequest) -> Result<Option<Payload>, CoreError>;
}
