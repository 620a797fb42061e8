//! ConnectivityMonitor trait - network reachability interface

use crate::error::CoreError;

/// Network reachability check consulted before delivery.
#[trait_variant::make(ConnectivityMonitor: Send)]
pub trait LocalConnectivityMonitor {
    /// Resolve to `true` when the network is reachable.
    ///
    /// # Errors
    /// Returns [`CoreError::ConnectivityError`] when the check itself fails;
    /// callers treat that the same as offline.
    async fn check_is_connected(&self) -> Result<bool, CoreError>;
}
