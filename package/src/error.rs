//! Error types for package database queries

use thiserror::Error;

/// Result type alias for package operations
pub type Result<T> = std::result::Result<T, Error>;

/// Package errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Invalid package specification: {0}")]
    InvalidPackageSpec(String),

    #[error("Malformed metadata for {cpv}: {message}")]
    InvalidMetadata { cpv: String, message: String },

    #[error("Repository not found: {0}")]
    RepositoryNotFound(std::path::PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Walk directory error: {0}")]
    WalkDirError(#[from] walkdir::Error),
}
