//! Configuration data structures for term_embed
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::catalog::Connection;
use crate::part::PartConfig;

/// Top-level configuration file
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct EmbedConfig {
    /// How terminal sessions are created
    pub terminal: TerminalSettings,

    /// Logging options
    pub logging: LoggingConfig,

    /// Saved SSH connections
    pub connections: Vec<Connection>,
}

/// Terminal session settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TerminalSettings {
    /// Name of the terminal part to load
    pub part: String,

    /// Program used for remote sessions
    pub ssh_program: String,

    /// Environment variable naming the user's default shell
    pub shell_env_var: String,

    /// Shell used when neither an explicit shell nor the variable is set
    pub fallback_shell: String,

    /// Working directory for started programs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Initial terminal size
    pub size: TerminalSize,

    /// Extra environment for started programs
    pub environment: BTreeMap<String, String>,
}

/// Terminal size configuration
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct TerminalSize {
    /// Number of columns
    pub columns: u16,

    /// Number of rows
    pub rows: u16,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set
    pub level: String,

    /// Write logs to this file instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Part loaded when the configuration does not name one
pub fn default_part() -> &'static str {
    if cfg!(feature = "portable-pty") {
        "pty"
    } else {
        "memory"
    }
}

impl Default for TerminalSettings {
    fn default() -> Self {
        let environment = BTreeMap::from([
            ("TERM".to_string(), "xterm-256color".to_string()),
            ("COLORTERM".to_string(), "truecolor".to_string()),
        ]);

        Self {
            part: default_part().to_string(),
            ssh_program: "ssh".to_string(),
            shell_env_var: "SHELL".to_string(),
            fallback_shell: "/bin/sh".to_string(),
            working_directory: None,
            size: TerminalSize::default(),
            environment,
        }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self {
            columns: 80,
            rows: 24,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl TerminalSettings {
    /// Settings handed to the part factory
    pub fn part_config(&self) -> PartConfig {
        PartConfig {
            cols: self.size.columns,
            rows: self.size.rows,
            env: self
                .environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            cwd: self.working_directory.clone(),
        }
    }
}
