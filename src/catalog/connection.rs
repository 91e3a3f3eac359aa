use serde::{Deserialize, Serialize};

use super::error::ConnectionError;

/// Folder used for connections saved without one
pub const DEFAULT_FOLDER: &str = "Default";

/// Port used for connections saved without one
pub const DEFAULT_SSH_PORT: u16 = 22;

fn default_folder() -> String {
    DEFAULT_FOLDER.to_string()
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// A saved SSH destination
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Connection {
    /// Display name, unique within a catalog
    pub label: String,

    pub host: String,

    pub username: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Folder the connection is listed under
    #[serde(default = "default_folder")]
    pub folder: String,

    /// Private key passed to ssh with `-i`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,

    /// Command typed into the session once it starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_cmd: Option<String>,
}

impl Connection {
    pub fn new(label: impl Into<String>, host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            host: host.into(),
            username: username.into(),
            port: DEFAULT_SSH_PORT,
            folder: default_folder(),
            key_path: None,
            initial_cmd: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    pub fn with_initial_cmd(mut self, initial_cmd: impl Into<String>) -> Self {
        self.initial_cmd = Some(initial_cmd.into());
        self
    }

    /// `user@host` as passed to ssh
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    /// Check the fields a session needs
    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.label.trim().is_empty() {
            return Err(ConnectionError::EmptyLabel);
        }
        if self.host.trim().is_empty() {
            return Err(ConnectionError::MissingHost(self.label.clone()));
        }
        if self.username.trim().is_empty() {
            return Err(ConnectionError::MissingUsername(self.label.clone()));
        }
        if self.port == 0 {
            return Err(ConnectionError::InvalidPort(self.label.clone()));
        }
        Ok(())
    }
}
