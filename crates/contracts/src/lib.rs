//! # Contracts
//!
//! Frozen interface contracts, defining the data types and capability traits
//! shared by every crate in the pipeline. Business crates depend only on this
//! crate; reverse dependencies are prohibited.
//!
//! ## Time model
//! - Track payloads carry a unix-millisecond timestamp under
//!   `keys::TIMESTAMP_UNIX_MS`; request ordering is defined over that field
//! - Expiry instants are unix milliseconds (i64)

mod config;
mod connectivity;
mod dispatcher;
mod error;
pub mod events;
pub mod keys;
mod request;
mod session;
mod validator;
mod value;

pub use config::{defaults, SdkConfig};
pub use connectivity::ConnectivityMonitor;
pub use dispatcher::{EventDispatcher, LocalEventDispatcher};
pub use error::{CoreError, ErrorKind};
pub use request::{
    BatchTrackRequest, CompletionCallback, DispatchOutcome, DispatchRequest, TrackRequest,
    SHARED_KEYS,
};
pub use session::SessionStarter;
pub use validator::{DispatchListener, DispatchValidator, QueueDelegate};
pub use value::{merge, Payload, TrackValue};
