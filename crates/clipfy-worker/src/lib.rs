//! Batch media conversion worker.
//!
//! This crate provides:
//! - The sequential batch runner with fallback commands and cancellation
//! - A single-slot executor with replace-if-running semantics
//! - Configuration, structured logging and metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod runner;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{BatchExecutor, BatchHandle};
pub use logging::BatchLogger;
pub use runner::{BatchOutcome, BatchReport, BatchRunner};
