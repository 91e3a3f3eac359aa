//! Displayable surface handles with identity, layout and teardown notification
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroU64;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use super::subscription::Subscription;

/// Process-wide id generator. Ids are never recycled.
static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Callback invoked once when a surface is destroyed
pub type DestroyCallback = Box<dyn FnOnce(SurfaceId)>;

/// Opaque identity of a surface, usable as a map key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(NonZeroU64);

impl SurfaceId {
    fn next() -> Self {
        let raw = NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed);
        // Counter starts at 1 and a u64 will not wrap in practice
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MAX))
    }

    /// Rebuild an id from its raw value; `0` is the null handle
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw value handed across the C boundary
    pub fn as_u64(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Content margins of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margins {
    pub left: u16,
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
}

impl Margins {
    pub const ZERO: Margins = Margins {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };
}

/// A child held by a layout until the child is destroyed
struct Embedded {
    surface: Rc<Surface>,
    _on_destroyed: Subscription,
}

/// Vertical stack of child surfaces
#[derive(Default)]
struct Layout {
    margins: Margins,
    children: Vec<Embedded>,
}

#[derive(Default)]
struct SurfaceState {
    destroyed: bool,
    layout: Option<Layout>,
    attachments: Vec<Box<dyn Any>>,
    subscribers: Vec<(u64, DestroyCallback)>,
    next_subscriber_id: u64,
}

/// A displayable surface.
///
/// Surfaces are shared through `Rc` and live on the event-loop thread. A
/// surface owns its embedded children and any attached objects; destroying
/// it (explicitly or by dropping the last handle) notifies subscribers,
/// destroys the children and releases the attachments.
pub struct Surface {
    id: SurfaceId,
    state: RefCell<SurfaceState>,
}

impl Surface {
    /// Create a new top-level surface
    pub fn new() -> Rc<Self> {
        let surface = Rc::new(Self {
            id: SurfaceId::next(),
            state: RefCell::new(SurfaceState::default()),
        });
        trace!("Created {}", surface.id);
        surface
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    /// Embed `child` into this surface's layout with zero margins.
    ///
    /// Creates the layout on first use. Destroyed surfaces and self-embedding
    /// are ignored. The child leaves the layout when it is destroyed.
    pub fn embed(self: &Rc<Self>, child: &Rc<Surface>) {
        if child.id == self.id || child.is_destroyed() {
            debug!("Ignoring embed of {} into {}", child.id, self.id);
            return;
        }

        let mut state = self.state.borrow_mut();
        if state.destroyed {
            debug!("Ignoring embed into destroyed {}", self.id);
            return;
        }

        let layout = state.layout.get_or_insert_with(Layout::default);
        layout.margins = Margins::ZERO;
        if layout.children.iter().any(|c| c.surface.id == child.id) {
            return;
        }

        let parent = Rc::downgrade(self);
        let on_destroyed = child.on_destroyed(move |id| {
            if let Some(parent) = parent.upgrade() {
                parent.remove_child(id);
            }
        });
        layout.children.push(Embedded {
            surface: Rc::clone(child),
            _on_destroyed: on_destroyed,
        });
        debug!("Embedded {} into {}", child.id, self.id);
    }

    fn remove_child(&self, id: SurfaceId) {
        // The parent may itself be mid-destroy with its layout taken out
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return;
        };
        let removed = state.layout.as_mut().and_then(|layout| {
            let index = layout.children.iter().position(|c| c.surface.id == id)?;
            Some(layout.children.remove(index))
        });
        drop(state);
        if removed.is_some() {
            trace!("Removed destroyed {} from {}", id, self.id);
        }
    }

    /// Whether a layout has been installed on this surface
    pub fn has_layout(&self) -> bool {
        self.state.borrow().layout.is_some()
    }

    /// Layout margins, if a layout exists
    pub fn margins(&self) -> Option<Margins> {
        self.state.borrow().layout.as_ref().map(|l| l.margins)
    }

    /// Live embedded children, in embedding order
    pub fn children(&self) -> Vec<Rc<Surface>> {
        self.state
            .borrow()
            .layout
            .as_ref()
            .map(|l| {
                l.children
                    .iter()
                    .map(|c| Rc::clone(&c.surface))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tie the lifetime of `object` to this surface.
    ///
    /// On a destroyed surface the object is dropped immediately.
    pub fn attach(&self, object: Box<dyn Any>) {
        let mut state = self.state.borrow_mut();
        if state.destroyed {
            drop(state);
            drop(object);
            return;
        }
        state.attachments.push(object);
    }

    /// Subscribe a one-shot callback to this surface's destruction.
    ///
    /// The returned token unsubscribes when cancelled or dropped. On an
    /// already destroyed surface the callback is discarded and the token is
    /// inert.
    pub fn on_destroyed<F>(self: &Rc<Self>, callback: F) -> Subscription
    where
        F: FnOnce(SurfaceId) + 'static,
    {
        let mut state = self.state.borrow_mut();
        if state.destroyed {
            return Subscription::inert();
        }

        state.next_subscriber_id += 1;
        let subscriber_id = state.next_subscriber_id;
        state.subscribers.push((subscriber_id, Box::new(callback)));
        trace!("Subscriber {} added to {}", subscriber_id, self.id);

        Subscription::new(Rc::downgrade(self), subscriber_id)
    }

    /// Remove a pending destruction subscriber
    pub(crate) fn unsubscribe(&self, subscriber_id: u64) -> bool {
        // Tolerate re-entrant calls made while destroy() is running
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return false;
        };
        let before = state.subscribers.len();
        state.subscribers.retain(|(id, _)| *id != subscriber_id);
        let removed = state.subscribers.len() < before;
        if removed {
            trace!("Subscriber {} removed from {}", subscriber_id, self.id);
        }
        removed
    }

    pub(crate) fn has_subscriber(&self, subscriber_id: u64) -> bool {
        self.state
            .borrow()
            .subscribers
            .iter()
            .any(|(id, _)| *id == subscriber_id)
    }

    /// Number of pending destruction subscribers
    pub fn subscriber_count(&self) -> usize {
        self.state.borrow().subscribers.len()
    }

    /// Destroy the surface. Idempotent.
    ///
    /// Subscribers run first, in subscription order, then embedded children
    /// are destroyed and attachments released.
    pub fn destroy(&self) {
        let (subscribers, layout, attachments) = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            (
                std::mem::take(&mut state.subscribers),
                state.layout.take(),
                std::mem::take(&mut state.attachments),
            )
        };

        debug!(
            "Destroying {} ({} subscribers, {} attachments)",
            self.id,
            subscribers.len(),
            attachments.len()
        );

        for (_, callback) in subscribers {
            callback(self.id);
        }

        if let Some(layout) = layout {
            for child in layout.children {
                child.surface.destroy();
            }
        }

        drop(attachments);
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Surface")
            .field("id", &self.id)
            .field("destroyed", &state.destroyed)
            .field(
                "children",
                &state.layout.as_ref().map_or(0, |l| l.children.len()),
            )
            .field("attachments", &state.attachments.len())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}
