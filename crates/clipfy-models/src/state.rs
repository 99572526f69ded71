//! Processing state and progress samples reported to observers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Status reported for a batch.
///
/// `Completed` and `Error` are terminal: nothing follows them within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessingState {
    /// An item finished; carries every permanent path produced so far
    Processed { paths: Vec<PathBuf> },

    /// All items finished; carries every permanent path in item order
    Completed { paths: Vec<PathBuf> },

    /// The batch aborted
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        ffmpeg_logs: Option<String>,
    },
}

impl ProcessingState {
    pub fn processed(paths: &[PathBuf]) -> Self {
        Self::Processed {
            paths: paths.to_vec(),
        }
    }

    pub fn completed(paths: &[PathBuf]) -> Self {
        Self::Completed {
            paths: paths.to_vec(),
        }
    }

    pub fn error(message: impl Into<String>, ffmpeg_logs: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            ffmpeg_logs,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Processed { .. } => "processed",
            ProcessingState::Completed { .. } => "completed",
            ProcessingState::Error { .. } => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingState::Completed { .. } | ProcessingState::Error { .. }
        )
    }

    /// Output paths carried by the state, empty for errors.
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            ProcessingState::Processed { paths } | ProcessingState::Completed { paths } => paths,
            ProcessingState::Error { .. } => &[],
        }
    }
}

/// Latest completion value and the item it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Percent complete, 0.0 to 100.0
    pub progress: f32,
    /// Index of the item the value refers to
    pub index: usize,
}

impl ProgressSample {
    /// Create a sample, clamping the value into 0..=100.
    pub fn new(progress: f32, index: usize) -> Self {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 100.0)
        };
        Self { progress, index }
    }
}
