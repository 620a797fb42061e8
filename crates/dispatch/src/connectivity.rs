//! Connectivity override backed by a shared flag.
//!
//! Stands in for a platform reachability monitor in tests, demos, and
//! embeddings that receive connectivity signals from outside.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use contracts::{ConnectivityMonitor, CoreError};

/// Connectivity state settable from anywhere via cloned handles.
#[derive(Clone)]
pub struct SharedConnectivity {
    connected: Arc<AtomicBool>,
}

impl SharedConnectivity {
    pub fn online() -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn offline() -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl ConnectivityMonitor for SharedConnectivity {
    async fn check_is_connected(&self) -> Result<bool, CoreError> {
        Ok(self.connected.load(Ordering::SeqCst))
    }
}
