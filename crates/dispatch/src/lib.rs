//! # Dispatch
//!
//! Request-processing pipeline for track events.
//!
//! Responsibilities:
//! - Orchestrate validators, listeners, and delivery backends
//! - Persist requests the policy holds back (batching, offline, consent)
//! - Fan out ready requests to isolated per-dispatcher workers
//! - Trim the persisted queue by age and size

pub mod connectivity;
pub mod dispatchers;
pub mod handle;
pub mod manager;
pub mod metrics;
pub mod queue;

pub use connectivity::SharedConnectivity;
pub use contracts::{DispatchRequest, EventDispatcher, TrackRequest};
pub use dispatchers::{LogDispatcher, MemoryDispatcher};
pub use handle::DispatcherHandle;
pub use manager::{Command, DispatchHandle, DispatchManager, DispatchManagerBuilder};
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
pub use queue::{PersistentDispatchQueue, PersistentQueueEntry};
