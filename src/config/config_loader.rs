//! Configuration file loader for term_embed
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{ConfigError, EmbedConfig};

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "term_embed.toml";

/// Configuration loader responsible for loading and parsing configuration files
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default file is used if
    /// present, otherwise built-in defaults.
    pub fn load_config(&self, config_path: Option<&Path>) -> Result<EmbedConfig, ConfigError> {
        match config_path {
            Some(path) => self.load_config_from_file(path),
            // 未指定路径时才回退到默认配置文件
            None => match default_config_path() {
                Some(path) if path.exists() => {
                    info!("Using default configuration file path: {:?}", path);
                    self.load_config_from_file(&path)
                }
                _ => {
                    info!("No configuration file found, using defaults");
                    Ok(EmbedConfig::default())
                }
            },
        }
    }

    /// Load configuration from a specific file path
    fn load_config_from_file(&self, path: &Path) -> Result<EmbedConfig, ConfigError> {
        info!("Loading configuration from file: {:?}", path);

        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.display().to_string()),
            _ => ConfigError::FileOpenError(e),
        })?;

        self.parse_config(&contents)
    }

    /// Parse and validate configuration from string content
    pub fn parse_config(&self, content: &str) -> Result<EmbedConfig, ConfigError> {
        let config = toml::from_str::<EmbedConfig>(content)?;
        validate(&config)?;
        debug!(
            "Configuration parsed successfully ({} connections)",
            config.connections.len()
        );
        Ok(config)
    }

    /// Write configuration to `path` as TOML
    pub fn save_config(&self, config: &EmbedConfig, path: &Path) -> Result<(), ConfigError> {
        validate(config)?;
        let contents = toml::to_string_pretty(config)?;
        fs::write(path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

fn validate(config: &EmbedConfig) -> Result<(), ConfigError> {
    let terminal = &config.terminal;
    if terminal.part.trim().is_empty() {
        return Err(ConfigError::InvalidStructure(
            "terminal.part must not be empty".to_string(),
        ));
    }
    if terminal.fallback_shell.trim().is_empty() {
        return Err(ConfigError::InvalidStructure(
            "terminal.fallback_shell must not be empty".to_string(),
        ));
    }
    if terminal.size.columns == 0 || terminal.size.rows == 0 {
        return Err(ConfigError::InvalidStructure(format!(
            "terminal.size must be non-zero, got {}x{}",
            terminal.size.columns, terminal.size.rows
        )));
    }

    let mut labels = HashSet::new();
    for connection in &config.connections {
        connection.validate()?;
        if !labels.insert(connection.label.as_str()) {
            return Err(ConfigError::InvalidStructure(format!(
                "duplicate connection label: {}",
                connection.label
            )));
        }
    }
    Ok(())
}

/// Default configuration path
pub fn default_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(DEFAULT_CONFIG_FILE))
}
