//! Host-facing context: owns the session manager and every surface handed
//! out across the C boundary
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::catalog::DEFAULT_SSH_PORT;
use crate::config::{ConfigError, ConfigLoader, EmbedConfig, init_logging};
use crate::part::PartLoader;
use crate::service::{RemoteTarget, SessionManager, SessionRegistry};
use crate::surface::{Subscription, Surface, SurfaceId};

type Entries = RefCell<HashMap<SurfaceId, (Rc<Surface>, Subscription)>>;
type PendingOutput = RefCell<HashMap<SurfaceId, Vec<u8>>>;

/// Surfaces known to the host, dropped from the table once destroyed along
/// with any output the host has not read yet
#[derive(Default)]
struct SurfaceTable {
    entries: Rc<Entries>,
    pending_output: Rc<PendingOutput>,
}

impl SurfaceTable {
    fn insert(&self, surface: Rc<Surface>) -> SurfaceId {
        let id = surface.id();
        let entries = Rc::downgrade(&self.entries);
        let pending_output = Rc::downgrade(&self.pending_output);
        let subscription = surface.on_destroyed(move |id| {
            if let Some(pending_output) = pending_output.upgrade() {
                pending_output.borrow_mut().remove(&id);
            }
            if let Some(entries) = entries.upgrade() {
                let removed = entries.borrow_mut().remove(&id);
                drop(removed);
            }
        });
        self.entries.borrow_mut().insert(id, (surface, subscription));
        id
    }

    fn get(&self, id: SurfaceId) -> Option<Rc<Surface>> {
        self.entries
            .borrow()
            .get(&id)
            .map(|(surface, _)| Rc::clone(surface))
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Everything a host needs to create and drive terminal sessions.
///
/// Surfaces are identified by raw [`SurfaceId`] values; the context keeps
/// them alive until the host destroys them (or their parent).
pub struct EmbedContext {
    manager: SessionManager,
    surfaces: SurfaceTable,
    _log_guard: Option<WorkerGuard>,
}

impl EmbedContext {
    /// Build a context from configuration, using the built-in parts
    pub fn new(config: EmbedConfig) -> Self {
        Self::with_loader(config, PartLoader::with_defaults())
    }

    pub fn with_loader(config: EmbedConfig, loader: PartLoader) -> Self {
        let manager = SessionManager::new(SessionRegistry::new(), loader, config.terminal);
        Self {
            manager,
            surfaces: SurfaceTable::default(),
            _log_guard: None,
        }
    }

    /// Load configuration (see [`ConfigLoader::load_config`]), set up logging
    /// and build a context
    pub fn from_config_path(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = ConfigLoader::new().load_config(path)?;
        let log_guard = init_logging(&config.logging, false);
        let mut context = Self::new(config);
        context._log_guard = log_guard;
        info!("Embed context ready");
        Ok(context)
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Create an empty host surface
    pub fn create_surface(&self) -> SurfaceId {
        self.surfaces.insert(Surface::new())
    }

    pub fn surface(&self, id: SurfaceId) -> Option<Rc<Surface>> {
        self.surfaces.get(id)
    }

    /// Number of live surfaces the context holds
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Destroy a surface and everything embedded in it
    pub fn destroy_surface(&self, id: SurfaceId) {
        match self.surfaces.get(id) {
            Some(surface) => surface.destroy(),
            None => debug!("Ignoring destroy of unknown {}", id),
        }
    }

    pub fn create_remote_session(&self, target: &RemoteTarget, parent: Option<SurfaceId>) -> Option<SurfaceId> {
        let parent = self.resolve_parent(parent);
        let surface = self.manager.create_remote_session(target, parent.as_ref())?;
        Some(self.surfaces.insert(surface))
    }

    pub fn create_local_session(&self, shell: Option<&str>, parent: Option<SurfaceId>) -> Option<SurfaceId> {
        let parent = self.resolve_parent(parent);
        let surface = self.manager.create_local_session(shell, parent.as_ref())?;
        Some(self.surfaces.insert(surface))
    }

    pub fn send_input(&self, surface: Option<SurfaceId>, text: Option<&str>) {
        match surface {
            Some(surface) => self.manager.send_input(surface, text),
            None => debug!("Ignoring input for null surface"),
        }
    }

    /// Copy up to `max` bytes of pending output for `surface`.
    ///
    /// Output that does not fit is kept for the next call. `None` if the
    /// surface has no session.
    pub fn read_output(&self, surface: SurfaceId, max: usize) -> Option<Vec<u8>> {
        let mut pending = self.surfaces.pending_output.borrow_mut();
        let Some(fresh) = self.manager.read_output(surface) else {
            pending.remove(&surface);
            return None;
        };

        let buffer = pending.entry(surface).or_default();
        buffer.extend_from_slice(&fresh);
        let take = buffer.len().min(max);
        Some(buffer.drain(..take).collect())
    }

    fn resolve_parent(&self, parent: Option<SurfaceId>) -> Option<Rc<Surface>> {
        let id = parent?;
        let surface = self.surfaces.get(id);
        if surface.is_none() {
            warn!("Unknown parent {}, creating an unparented session", id);
        }
        surface
    }
}

/// Port from a C int, falling back to the ssh default when out of range
pub(crate) fn port_from_c(port: i32) -> u16 {
    match u16::try_from(port) {
        Ok(port) if port != 0 => port,
        _ => {
            warn!("Invalid port {}, using {}", port, DEFAULT_SSH_PORT);
            DEFAULT_SSH_PORT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::MemoryPartFactory;

    fn context_with(factory: MemoryPartFactory) -> EmbedContext {
        let mut loader = PartLoader::new();
        loader.register(factory);
        let mut config = EmbedConfig::default();
        config.terminal.part = "memory".to_string();
        EmbedContext::with_loader(config, loader)
    }

    #[test]
    fn table_forgets_destroyed_surfaces() {
        let context = context_with(MemoryPartFactory::default());
        let parent = context.create_surface();
        let session = context.create_local_session(None, Some(parent)).unwrap();
        assert_eq!(context.surface_count(), 2);

        context.destroy_surface(parent);

        assert_eq!(context.surface_count(), 0);
        assert!(context.surface(session).is_none());
        assert!(context.manager().registry().is_empty());
    }

    #[test]
    fn cascade_discards_unread_output() {
        let context = context_with(MemoryPartFactory::default());
        let parent = context.create_surface();
        let first = context.create_local_session(None, Some(parent)).unwrap();
        let second = context.create_local_session(None, Some(parent)).unwrap();
        context.send_input(Some(first), Some("pwd"));
        context.send_input(Some(second), Some("whoami"));
        context.read_output(first, 1).unwrap();
        context.read_output(second, 1).unwrap();
        assert_eq!(context.surfaces.pending_output.borrow().len(), 2);

        context.destroy_surface(parent);

        assert!(context.surfaces.pending_output.borrow().is_empty());
        assert!(context.read_output(first, 16).is_none());
    }

    #[test]
    fn unknown_parent_creates_unparented_session() {
        let context = context_with(MemoryPartFactory::default());
        let stray = SurfaceId::from_raw(u64::MAX).unwrap();

        let session = context.create_local_session(None, Some(stray));

        assert!(session.is_some());
        assert_eq!(context.surface_count(), 1);
    }

    #[test]
    fn read_output_keeps_what_does_not_fit() {
        let context = context_with(MemoryPartFactory::default());
        let session = context.create_local_session(None, None).unwrap();
        context.send_input(Some(session), Some("hello"));

        assert_eq!(context.read_output(session, 3).unwrap(), b"hel".to_vec());
        assert_eq!(context.read_output(session, 16).unwrap(), b"lo\n".to_vec());
        assert!(context.read_output(session, 16).unwrap().is_empty());
    }

    #[test]
    fn dropping_context_tears_down_sessions() {
        let factory = MemoryPartFactory::default();
        let context = context_with(factory.clone());
        context.create_local_session(None, None).unwrap();
        assert_eq!(factory.terminals().len(), 1);

        drop(context);

        assert!(factory.terminals().is_empty());
    }

    #[test]
    fn ports_outside_u16_fall_back() {
        assert_eq!(port_from_c(2222), 2222);
        assert_eq!(port_from_c(0), 22);
        assert_eq!(port_from_c(-1), 22);
        assert_eq!(port_from_c(70000), 22);
    }
}
