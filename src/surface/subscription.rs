//! Cancellable one-shot subscription to a surface's destruction
use std::rc::Weak;

use super::surface::Surface;

/// Token for a pending destruction callback.
///
/// Cancelling or dropping the token removes the callback. Once the surface
/// has been destroyed the callback has already run (or been discarded) and
/// cancelling is a no-op.
#[must_use = "dropping a Subscription cancels it"]
#[derive(Debug)]
pub struct Subscription {
    surface: Weak<Surface>,
    subscriber_id: u64,
}

impl Subscription {
    pub(crate) fn new(surface: Weak<Surface>, subscriber_id: u64) -> Self {
        Self {
            surface,
            subscriber_id,
        }
    }

    /// A token that is not attached to any surface
    pub(crate) fn inert() -> Self {
        Self::new(Weak::new(), 0)
    }

    /// Whether the callback is still waiting for the surface to be destroyed
    pub fn is_active(&self) -> bool {
        self.surface
            .upgrade()
            .is_some_and(|surface| surface.has_subscriber(self.subscriber_id))
    }

    /// Unsubscribe now
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(surface) = self.surface.upgrade() {
            surface.unsubscribe(self.subscriber_id);
        }
    }
}
