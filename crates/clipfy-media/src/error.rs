//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while preparing or launching the encoder.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Encoder binary not found in PATH: {0}")]
    EncoderNotFound(String),

    #[error("Malformed command line: {0}")]
    MalformedCommand(String),

    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a malformed command error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedCommand(message.into())
    }

    /// Create a spawn failure error.
    pub fn spawn_failed(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            source,
        }
    }

    /// Whether the process never started (as opposed to starting and failing).
    pub fn is_launch_error(&self) -> bool {
        matches!(
            self,
            Self::EncoderNotFound(_) | Self::MalformedCommand(_) | Self::SpawnFailed { .. }
        )
    }
}
