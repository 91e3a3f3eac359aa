//! Registry of live terminal sessions keyed by surface
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::part::TerminalControl;
use crate::surface::{Subscription, Surface, SurfaceId};

struct Binding {
    /// Owned by the part attached to the surface, never by the registry
    control: Weak<dyn TerminalControl>,
    /// Removes the binding when the surface is destroyed; dropping it unsubscribes
    _subscription: Subscription,
}

type Bindings = RefCell<HashMap<SurfaceId, Binding>>;

/// Maps each surface to the control interface of its terminal session.
///
/// Bindings disappear on their own when the surface is destroyed. Clones share
/// the same bindings. The registry lives on the event-loop thread.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    bindings: Rc<Bindings>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `control` to `surface`, replacing any earlier binding.
    ///
    /// Missing arguments and destroyed surfaces are ignored. The binding is
    /// removed when `surface` is destroyed.
    pub fn register(&self, surface: Option<&Rc<Surface>>, control: Option<&Rc<dyn TerminalControl>>) {
        let (Some(surface), Some(control)) = (surface, control) else {
            debug!("Ignoring session registration with a missing surface or control");
            return;
        };
        if surface.is_destroyed() {
            debug!("Ignoring session registration for destroyed {}", surface.id());
            return;
        }

        let bindings = Rc::downgrade(&self.bindings);
        let subscription = surface.on_destroyed(move |id| {
            if let Some(bindings) = bindings.upgrade() {
                SessionRegistry { bindings }.unregister(id);
            }
        });

        let binding = Binding {
            control: Rc::downgrade(control),
            _subscription: subscription,
        };
        let previous = self.bindings.borrow_mut().insert(surface.id(), binding);
        if previous.is_some() {
            debug!("Replaced session for {}", surface.id());
        } else {
            debug!("Registered session for {}", surface.id());
        }
        // Dropping the old binding cancels its destruction subscription
        drop(previous);
    }

    /// Control interface of the live session on `surface`, if any
    pub fn lookup(&self, surface: SurfaceId) -> Option<Rc<dyn TerminalControl>> {
        self.bindings
            .borrow()
            .get(&surface)
            .and_then(|binding| binding.control.upgrade())
    }

    /// Drop the binding for `surface`. Idempotent.
    pub(crate) fn unregister(&self, surface: SurfaceId) {
        // Release the map before the binding (and its subscription) is dropped
        let removed = self.bindings.borrow_mut().remove(&surface);
        if removed.is_some() {
            debug!("Unregistered session for {}", surface);
        }
    }

    pub fn contains(&self, surface: SurfaceId) -> bool {
        self.bindings.borrow().contains_key(&surface)
    }

    /// Number of live bindings
    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::{MemoryTerminal, TerminalControl};

    fn control() -> Rc<dyn TerminalControl> {
        Rc::new(MemoryTerminal::default())
    }

    fn same(a: &Rc<dyn TerminalControl>, b: &Rc<dyn TerminalControl>) -> bool {
        Rc::ptr_eq(a, b)
    }

    #[test]
    fn lookup_returns_registered_control() {
        let registry = SessionRegistry::new();
        let surface = Surface::new();
        let c1 = control();

        registry.register(Some(&surface), Some(&c1));

        assert!(same(&registry.lookup(surface.id()).unwrap(), &c1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reregistering_replaces_control() {
        let registry = SessionRegistry::new();
        let surface = Surface::new();
        let c1 = control();
        let c2 = control();

        registry.register(Some(&surface), Some(&c1));
        registry.register(Some(&surface), Some(&c2));

        assert!(same(&registry.lookup(surface.id()).unwrap(), &c2));
        assert_eq!(registry.len(), 1);
        // The first subscription was cancelled along with its binding
        assert_eq!(surface.subscriber_count(), 1);
    }

    #[test]
    fn destroy_removes_binding() {
        let registry = SessionRegistry::new();
        let surface = Surface::new();
        let c1 = control();
        registry.register(Some(&surface), Some(&c1));

        surface.destroy();

        assert!(registry.lookup(surface.id()).is_none());
        assert!(!registry.contains(surface.id()));
        assert!(registry.is_empty());
    }

    #[test]
    fn dropping_surface_removes_binding() {
        let registry = SessionRegistry::new();
        let surface = Surface::new();
        let id = surface.id();
        let c1 = control();
        registry.register(Some(&surface), Some(&c1));

        drop(surface);

        assert!(registry.lookup(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = SessionRegistry::new();
        let keep = Surface::new();
        let gone = Surface::new();
        let c1 = control();
        registry.register(Some(&keep), Some(&c1));
        registry.register(Some(&gone), Some(&c1));

        registry.unregister(gone.id());
        registry.unregister(gone.id());

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(keep.id()));
        // A later destruction notification for the removed surface is harmless
        gone.destroy();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn missing_arguments_are_ignored() {
        let registry = SessionRegistry::new();
        let surface = Surface::new();
        let c1 = control();

        registry.register(None, Some(&c1));
        registry.register(Some(&surface), None);
        registry.register(None, None);

        assert!(registry.is_empty());
        assert_eq!(surface.subscriber_count(), 0);
    }

    #[test]
    fn destroyed_surface_is_not_registered() {
        let registry = SessionRegistry::new();
        let surface = Surface::new();
        surface.destroy();

        registry.register(Some(&surface), Some(&control()));

        assert!(registry.lookup(surface.id()).is_none());
    }

    #[test]
    fn registry_does_not_own_control() {
        let registry = SessionRegistry::new();
        let surface = Surface::new();
        let c1 = control();
        registry.register(Some(&surface), Some(&c1));
        assert_eq!(Rc::strong_count(&c1), 1);

        drop(c1);

        assert!(registry.lookup(surface.id()).is_none());
    }

    #[test]
    fn dropped_registry_leaves_surface_usable() {
        let surface = Surface::new();
        {
            let registry = SessionRegistry::new();
            registry.register(Some(&surface), Some(&control()));
        }
        // Subscription went away with the binding
        assert_eq!(surface.subscriber_count(), 0);
        surface.destroy();
    }
}
