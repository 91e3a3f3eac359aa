//! Configuration module for term_embed
mod config;
mod config_loader;
mod error;
mod logging;

pub use config::*;
pub use config_loader::{ConfigLoader, DEFAULT_CONFIG_FILE, default_config_path};
pub use error::ConfigError;
pub use logging::init_logging;
