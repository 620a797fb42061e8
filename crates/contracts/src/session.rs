//! SessionStarter trait - session-start capability

/// Fired when two rapid tracks roll a new session and tag-management
/// delivery needs the backend session to exist. Fire-and-forget; an
/// implementation typically spawns its own request task.
pub trait SessionStarter: Send + Sync {
    fn request_session(&self);
}
