//! Structured batch logging utilities.
//!
//! Provides consistent, structured logging for batch processing with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use clipfy_models::{BatchId, BatchKind};

/// Batch logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct BatchLogger {
    batch_id: String,
    kind: BatchKind,
}

impl BatchLogger {
    /// Create a new logger for a batch.
    pub fn new(batch_id: &BatchId, kind: BatchKind) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            kind,
        }
    }

    /// Log the start of a batch.
    pub fn log_start(&self, message: &str) {
        info!(
            batch_id = %self.batch_id,
            kind = %self.kind,
            "Batch started: {}", message
        );
    }

    /// Log a progress update during batch execution.
    pub fn log_progress(&self, message: &str) {
        info!(
            batch_id = %self.batch_id,
            kind = %self.kind,
            "Batch progress: {}", message
        );
    }

    /// Log a tolerated problem.
    pub fn log_warning(&self, message: &str) {
        warn!(
            batch_id = %self.batch_id,
            kind = %self.kind,
            "Batch warning: {}", message
        );
    }

    /// Log a batch abort.
    pub fn log_error(&self, message: &str) {
        error!(
            batch_id = %self.batch_id,
            kind = %self.kind,
            "Batch error: {}", message
        );
    }

    /// Log the completion of a batch.
    pub fn log_completion(&self, message: &str) {
        info!(
            batch_id = %self.batch_id,
            kind = %self.kind,
            "Batch completed: {}", message
        );
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    /// Create a tracing span for this batch.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "batch",
            batch_id = %self.batch_id,
            kind = %self.kind
        )
    }
}
