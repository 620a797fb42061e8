//! # Event Store
//!
//! Tiered key/value store for event enrichment data.
//!
//! Responsibilities:
//! - Map expiration classes to concrete expiry instants
//! - Keep durable, restart-scoped, and session-scoped data tiers
//! - Compute the merged "all event data" view injected into every track
//! - Detect session boundaries and assign session ids

mod expiration;
mod session;
mod store;

pub use expiration::{Expiration, TimeUnit};
pub use session::SessionTracker;
pub use store::{EventDataItem, EventDataStore};
