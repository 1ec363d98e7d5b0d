//! Persistence seam — durable-write triggers supplied by the storage layer.
//!
//! This core decides *when* state is dirty; the collaborator owns the
//! on-disk format. Both triggers are fire-and-forget and are never invoked
//! while a registry lock is held.

pub trait Persist: Send + Sync {
    /// Schedule a durable write of all authorization keys.
    fn write_keys(&self);

    /// Schedule a durable write of the client settings.
    fn write_settings(&self);
}
