use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;

// ================ 配置与错误类型 ================

/// Settings a part uses when it creates its terminal and spawns programs
#[derive(Debug, Clone)]
pub struct PartConfig {
    pub cols: u16,
    pub rows: u16,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl Default for PartConfig {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            env: vec![
                ("TERM".to_string(), "xterm-256color".to_string()),
                ("COLORTERM".to_string(), "truecolor".to_string()),
            ],
            cwd: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Terminal part not available: {0}")]
    NotAvailable(String),
    #[error("Process spawn failed: {0}")]
    SpawnFailed(String),
    #[error("A program is already running in this terminal")]
    AlreadyStarted,
    #[error("No program has been started in this terminal")]
    NotStarted,
    #[error("Other error: {0}")]
    Other(String),
}

// portable-pty reports everything through anyhow
impl From<anyhow::Error> for TerminalError {
    fn from(error: anyhow::Error) -> Self {
        TerminalError::Other(error.to_string())
    }
}

// ================ 核心Trait定义 ================

/// Control interface of an embedded terminal.
///
/// Methods take `&self`: the control is shared between the part that owns it
/// and the session registry, which only holds a weak reference.
pub trait TerminalControl {
    /// Start `program` with `args` inside the terminal
    fn start_program(&self, program: &str, args: &[String]) -> Result<(), TerminalError>;

    /// Write `text` verbatim into the terminal's input stream
    fn send_input(&self, text: &str) -> Result<(), TerminalError>;

    /// Take whatever output the program produced since the last call
    fn drain_output(&self) -> Vec<u8>;

    /// Whether a started program is still running
    fn is_running(&self) -> bool;
}

/// An instantiated terminal component.
///
/// The control capability is optional: a part that cannot be driven
/// programmatically still provides a surface but returns `None` here.
pub trait TerminalPart {
    fn control(&self) -> Option<Rc<dyn TerminalControl>>;

    fn name(&self) -> &'static str;
}

/// Part factory trait
pub trait PartFactory {
    /// Create a new part instance
    fn create(&self, config: &PartConfig) -> Result<Box<dyn TerminalPart>, TerminalError>;

    /// Name the part is loaded by
    fn name(&self) -> &'static str;
}
