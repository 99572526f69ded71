//! Batch enqueue contract and state observation.
//!
//! This crate provides:
//! - Video and image batch descriptors with validation
//! - The state bus: latest-value broadcast of batch state and progress

pub mod error;
pub mod job;
pub mod progress;

pub use error::{QueueError, QueueResult};
pub use job::{BatchJob, ImageBatchJob, VideoBatchJob};
pub use progress::{BatchPublisher, BusEvent, ListenerHandle, StateBus, Subscription};
