//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while persisting an artifact.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Write denied: {0}")]
    WriteDenied(String),

    #[error("Source file missing: {0}")]
    SourceMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    pub fn write_denied(msg: impl Into<String>) -> Self {
        Self::WriteDenied(msg.into())
    }

    /// Map an IO error, turning permission failures into `WriteDenied`.
    pub fn from_write(e: std::io::Error, target: &std::path::Path) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                Self::WriteDenied(format!("{}: {}", target.display(), e))
            }
            _ => Self::Io(e),
        }
    }
}
