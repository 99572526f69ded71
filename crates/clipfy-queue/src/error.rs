//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Missing or malformed batch input; the batch never reaches the item loop.
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn invalid_batch(msg: impl Into<String>) -> Self {
        Self::InvalidBatch(msg.into())
    }
}
