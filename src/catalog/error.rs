//! Error types for saved connections
use thiserror::Error;

/// Why a saved connection cannot be opened
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection label must not be empty")]
    EmptyLabel,

    #[error("connection {0:?} has no host")]
    MissingHost(String),

    #[error("connection {0:?} has no username")]
    MissingUsername(String),

    #[error("connection {0:?} has port 0")]
    InvalidPort(String),
}
