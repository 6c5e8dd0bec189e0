/// Receives busy signals from the coordinator.
///
/// `activity_started` is called when the first request becomes outstanding, and
/// `activity_idle` once no requests are outstanding anymore.
pub trait ActivityIndicator: Send + Sync {
    fn activity_started(&self);
    fn activity_idle(&self);
}

/// An [`ActivityIndicator`] that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoActivityIndicator;

impl ActivityIndicator for NoActivityIndicator {
    fn activity_started(&self) {
        tracing::trace!("Request activity started");
    }

    fn activity_idle(&self) {
        tracing::trace!("Request activity idle");
    }
}
