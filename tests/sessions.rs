use std::rc::Rc;

use term_embed::config::TerminalSettings;
use term_embed::part::{MemoryPartFactory, MemoryTerminal, PartLoader, TerminalControl};
use term_embed::service::{RemoteTarget, SessionManager, SessionRegistry};
use term_embed::surface::Surface;

const UNSET_SHELL_VAR: &str = "TERM_EMBED_INTEGRATION_UNSET_SHELL";

fn memory_manager(factory: &MemoryPartFactory) -> SessionManager {
    let mut loader = PartLoader::new();
    loader.register(factory.clone());
    let settings = TerminalSettings {
        part: "memory".to_string(),
        shell_env_var: UNSET_SHELL_VAR.to_string(),
        fallback_shell: "/bin/sh".to_string(),
        ..TerminalSettings::default()
    };
    SessionManager::new(SessionRegistry::new(), loader, settings)
}

#[test]
fn registered_session_disappears_with_its_surface() {
    let registry = SessionRegistry::new();
    let w1 = Surface::new();
    let c1: Rc<dyn TerminalControl> = Rc::new(MemoryTerminal::default());

    registry.register(Some(&w1), Some(&c1));
    let found = registry.lookup(w1.id()).expect("session registered");
    assert!(Rc::ptr_eq(&found, &c1));
    drop(found);

    w1.destroy();

    assert!(registry.lookup(w1.id()).is_none());
}

#[test]
fn latest_registration_wins() {
    let registry = SessionRegistry::new();
    let surface = Surface::new();
    let c1: Rc<dyn TerminalControl> = Rc::new(MemoryTerminal::default());
    let c2: Rc<dyn TerminalControl> = Rc::new(MemoryTerminal::default());

    registry.register(Some(&surface), Some(&c1));
    registry.register(Some(&surface), Some(&c2));

    let found = registry.lookup(surface.id()).unwrap();
    assert!(Rc::ptr_eq(&found, &c2));
    assert!(!Rc::ptr_eq(&found, &c1));
}

#[test]
fn remote_session_without_terminal_part_returns_none() {
    let manager = SessionManager::new(
        SessionRegistry::new(),
        PartLoader::new(),
        TerminalSettings::default(),
    );
    let parent = Surface::new();
    let target = RemoteTarget::new("alice", "example.com", 22)
        .with_key_path("")
        .with_initial_command("ls\n");

    let surface = manager.create_remote_session(&target, Some(&parent));

    assert!(surface.is_none());
    assert!(!parent.has_layout());
    assert!(parent.children().is_empty());
}

#[test]
fn local_session_without_shell_variable_uses_fallback() {
    let factory = MemoryPartFactory::default();
    let manager = memory_manager(&factory);
    let parent = Surface::new();

    let surface = manager.create_local_session(Some(""), Some(&parent)).unwrap();

    let terminal = &factory.terminals()[0];
    assert_eq!(terminal.program().as_deref(), Some("/bin/sh"));
    assert!(terminal.args().is_empty());
    assert_eq!(parent.children()[0].id(), surface.id());
}

#[test]
fn input_reaches_only_live_sessions() {
    let factory = MemoryPartFactory::default();
    let manager = memory_manager(&factory);
    let parent = Surface::new();
    let first = manager.create_local_session(None, Some(&parent)).unwrap();
    let second = manager.create_local_session(None, Some(&parent)).unwrap();
    let terminals = factory.terminals();

    manager.send_input(first.id(), Some("pwd"));
    manager.send_input(second.id(), Some("whoami"));
    assert_eq!(terminals[0].input_text(), "pwd\n");
    assert_eq!(terminals[1].input_text(), "whoami\n");

    first.destroy();
    manager.send_input(first.id(), Some("ls"));
    manager.send_input(second.id(), Some("ls"));

    assert_eq!(terminals[0].input_text(), "pwd\n");
    assert_eq!(terminals[1].input_text(), "whoami\nls\n");
    assert_eq!(parent.children().len(), 1);
    assert_eq!(manager.registry().len(), 1);
}

#[test]
fn unregistered_surface_input_is_a_noop() {
    let factory = MemoryPartFactory::default();
    let manager = memory_manager(&factory);
    let stranger = Surface::new();

    manager.send_input(stranger.id(), Some("text"));

    assert!(manager.registry().is_empty());
    assert_eq!(factory.created_count(), 0);
}

#[test]
fn lookup_never_outlives_the_surface() {
    let factory = MemoryPartFactory::default();
    let manager = memory_manager(&factory);
    let ids: Vec<_> = (0..4)
        .map(|_| {
            let surface = manager
                .create_remote_session(&RemoteTarget::new("u", "h", 22), None)
                .unwrap();
            let id = surface.id();
            // Dropping the only handle destroys the surface
            drop(surface);
            id
        })
        .collect();

    for id in ids {
        assert!(manager.registry().lookup(id).is_none());
    }
    assert!(manager.registry().is_empty());
    assert!(factory.terminals().is_empty());
}
