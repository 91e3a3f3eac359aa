//! Session manager for creating terminal sessions and forwarding input
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::catalog::Connection;
use crate::config::TerminalSettings;
use crate::part::{LoadedPart, PartLoader, TerminalControl, send_line};
use crate::service::SessionRegistry;
use crate::surface::{Surface, SurfaceId};

/// Where a remote session connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub user: String,
    pub host: String,
    pub port: u16,
    /// Private key passed with `-i`; empty means none
    pub key_path: Option<String>,
    /// Typed into the session after the program starts; empty means none
    pub initial_command: Option<String>,
}

impl RemoteTarget {
    pub fn new(user: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            port,
            key_path: None,
            initial_command: None,
        }
    }

    pub fn with_key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    pub fn with_initial_command(mut self, command: impl Into<String>) -> Self {
        self.initial_command = Some(command.into());
        self
    }

    /// Arguments for the ssh program: `[-i KEY] USER@HOST -p PORT`
    pub fn ssh_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(5);
        if let Some(key) = self.key_path.as_deref().filter(|k| !k.is_empty()) {
            args.push("-i".to_string());
            args.push(key.to_string());
        }
        args.push(format!("{}@{}", self.user, self.host));
        args.push("-p".to_string());
        args.push(self.port.to_string());
        args
    }
}

impl From<&Connection> for RemoteTarget {
    fn from(connection: &Connection) -> Self {
        Self {
            user: connection.username.clone(),
            host: connection.host.clone(),
            port: connection.port,
            key_path: connection.key_path.clone(),
            initial_command: connection.initial_cmd.clone(),
        }
    }
}

/// Pick the shell for a local session: the explicit one, then the
/// environment's default, then `fallback`. Empty values are skipped.
pub fn resolve_shell(explicit: Option<&str>, from_env: Option<String>, fallback: &str) -> String {
    if let Some(shell) = explicit.filter(|s| !s.is_empty()) {
        return shell.to_string();
    }
    match from_env {
        Some(shell) if !shell.is_empty() => shell,
        _ => fallback.to_string(),
    }
}

/// Creates terminal sessions on surfaces and forwards input to them
pub struct SessionManager {
    registry: SessionRegistry,
    loader: PartLoader,
    settings: TerminalSettings,
}

impl SessionManager {
    /// Create a session manager around an existing registry
    pub fn new(registry: SessionRegistry, loader: PartLoader, settings: TerminalSettings) -> Self {
        Self {
            registry,
            loader,
            settings,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &TerminalSettings {
        &self.settings
    }

    /// Create a surface running the ssh program against `target`.
    ///
    /// Returns `None` if the terminal part could not be instantiated; the
    /// parent is left untouched in that case. A part without a control
    /// interface still yields its surface, but nothing is started and no
    /// session is registered.
    pub fn create_remote_session(&self, target: &RemoteTarget, parent: Option<&Rc<Surface>>) -> Option<Rc<Surface>> {
        let (surface, control) = self.load_part(parent)?;

        match control {
            Some(control) => {
                let args = target.ssh_args();
                info!(
                    "Starting remote session on {}: {} {:?}",
                    surface.id(),
                    self.settings.ssh_program,
                    args
                );
                match control.start_program(&self.settings.ssh_program, &args) {
                    Ok(()) => {
                        if let Some(command) = target.initial_command.as_deref().filter(|c| !c.is_empty()) {
                            if let Err(e) = send_line(control.as_ref(), command) {
                                warn!("Failed to send initial command on {}: {}", surface.id(), e);
                            }
                        }
                    }
                    Err(e) => warn!("Failed to start {} on {}: {}", self.settings.ssh_program, surface.id(), e),
                }
                self.registry.register(Some(&surface), Some(&control));
            }
            None => warn!("Terminal part on {} exposes no control interface", surface.id()),
        }

        Some(surface)
    }

    /// Create a surface running a local shell.
    ///
    /// The shell is `shell` if non-empty, else the configured environment
    /// variable, else the configured fallback. It is started without arguments.
    pub fn create_local_session(&self, shell: Option<&str>, parent: Option<&Rc<Surface>>) -> Option<Rc<Surface>> {
        let (surface, control) = self.load_part(parent)?;

        match control {
            Some(control) => {
                let program = self.resolve_shell(shell);
                info!("Starting local session on {}: {}", surface.id(), program);
                if let Err(e) = control.start_program(&program, &[]) {
                    warn!("Failed to start {} on {}: {}", program, surface.id(), e);
                }
                self.registry.register(Some(&surface), Some(&control));
            }
            None => warn!("Terminal part on {} exposes no control interface", surface.id()),
        }

        Some(surface)
    }

    /// Open a saved connection as a remote session
    pub fn open_connection(&self, connection: &Connection, parent: Option<&Rc<Surface>>) -> Option<Rc<Surface>> {
        info!("Opening connection {:?}", connection.label);
        self.create_remote_session(&RemoteTarget::from(connection), parent)
    }

    /// Write `text` and a newline into the session on `surface`.
    ///
    /// Unknown surfaces and missing text are ignored.
    pub fn send_input(&self, surface: SurfaceId, text: Option<&str>) {
        let Some(text) = text else {
            debug!("Ignoring empty input for {}", surface);
            return;
        };
        let Some(control) = self.registry.lookup(surface) else {
            debug!("No session registered for {}", surface);
            return;
        };
        if let Err(e) = send_line(control.as_ref(), text) {
            warn!("Failed to send input to {}: {}", surface, e);
        }
    }

    /// Output produced by the session on `surface` since the last call
    pub fn read_output(&self, surface: SurfaceId) -> Option<Vec<u8>> {
        self.registry
            .lookup(surface)
            .map(|control| control.drain_output())
    }

    /// Whether the program in the session on `surface` is still running
    pub fn is_running(&self, surface: SurfaceId) -> bool {
        self.registry
            .lookup(surface)
            .is_some_and(|control| control.is_running())
    }

    /// Shell a local session would start for `explicit`
    pub fn resolve_shell(&self, explicit: Option<&str>) -> String {
        let from_env = std::env::var(&self.settings.shell_env_var).ok();
        resolve_shell(explicit, from_env, &self.settings.fallback_shell)
    }

    /// Instantiate the configured part, embed it into `parent` and tie the
    /// part's lifetime to its surface.
    fn load_part(&self, parent: Option<&Rc<Surface>>) -> Option<(Rc<Surface>, Option<Rc<dyn TerminalControl>>)> {
        let LoadedPart { surface, part } =
            match self.loader.instantiate(&self.settings.part, &self.settings.part_config()) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!("Failed to load terminal part {:?}: {}", self.settings.part, e);
                    return None;
                }
            };

        if let Some(parent) = parent {
            parent.embed(&surface);
        }

        // 部件随 surface 一起销毁
        let control = part.control();
        surface.attach(Box::new(part));
        Some((surface, control))
    }
}
