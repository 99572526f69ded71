//! Shared data models for the Clipfy batch encoder.
//!
//! This crate provides Serde-serializable types for:
//! - Batches and their per-item work units
//! - Processing state and progress samples reported to observers
//! - Output format normalisation and media classification

pub mod batch;
pub mod format;
pub mod state;

// Re-export common types
pub use batch::{Batch, BatchId, BatchKind, JobItem, NotificationMeta};
pub use format::{actual_extension, mime_type, MediaKind};
pub use state::{ProcessingState, ProgressSample};
