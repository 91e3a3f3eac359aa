//! Error types for configuration module
use std::io::Error as IoError;

use thiserror::Error;
use toml::de::Error as TomlDeError;
use toml::ser::Error as TomlSerError;

use crate::catalog::ConnectionError;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to open or write the configuration file
    #[error("Failed to open configuration file: {0}")]
    FileOpenError(#[from] IoError),

    /// Failed to parse configuration file
    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] TomlDeError),

    /// Failed to serialize configuration
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] TomlSerError),

    /// Configuration file not found
    #[error("Configuration file not found at: {0}")]
    FileNotFound(String),

    /// Invalid configuration structure
    #[error("Invalid configuration structure: {0}")]
    InvalidStructure(String),

    /// A saved connection is incomplete
    #[error("Invalid connection: {0}")]
    InvalidConnection(#[from] ConnectionError),
}
