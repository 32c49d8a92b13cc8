//! Error types for configuration handling

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration not found: {0}")]
    NotFound(PathBuf),

    #[error("Parse error in {path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Invalid atom: {0}")]
    InvalidAtom(String),

    #[error("Invalid cpv: {0}")]
    InvalidCpv(String),

    #[error("Missing configuration key: {0}")]
    MissingKey(String),

    #[error("Settings are locked")]
    Locked,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
