//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors surfaced to the dispatcher.
///
/// Per-item failures never appear here: the runner converts them into state
/// emissions and a [`crate::BatchReport`].
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Missing or malformed batch inputs
    #[error("Invalid batch data: {0}")]
    Data(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The batch task ended without producing a report
    #[error("Batch task failed: {0}")]
    Join(String),

    #[error("Storage error: {0}")]
    Storage(#[from] clipfy_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] clipfy_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] clipfy_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn join(msg: impl Into<String>) -> Self {
        Self::Join(msg.into())
    }

    /// Check if the batch was rejected before reaching the item loop.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            WorkerError::Data(_) | WorkerError::Queue(clipfy_queue::QueueError::InvalidBatch(_))
        )
    }
}
