//! Service layer: the session registry and the call-throughs that create
//! sessions and forward input through it
mod session_manager;
mod session_registry;

// Re-export public types and functions
pub use session_manager::{RemoteTarget, SessionManager, resolve_shell};
pub use session_registry::SessionRegistry;
