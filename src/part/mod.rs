//! Terminal parts: the external terminal component behind a surface.
//!
//! A part is loaded by name through [`PartLoader`] and may expose a
//! [`TerminalControl`] for starting programs and writing input.

mod loader;
mod memory_part;
mod part_trait;
#[cfg(feature = "portable-pty")]
mod portable_pty_impl;

pub use loader::{LoadedPart, PartLoader};
pub use memory_part::{MemoryPart, MemoryPartFactory, MemoryTerminal};
pub use part_trait::*;
#[cfg(feature = "portable-pty")]
pub use portable_pty_impl::{PortablePtyFactory, PortablePtyPart, PortablePtyTerminal};

/// Write `text` followed by a newline, as two separate input writes
pub fn send_line(control: &dyn TerminalControl, text: &str) -> Result<(), TerminalError> {
    control.send_input(text)?;
    control.send_input("\n")
}
