//! Artifact storage for Clipfy.
//!
//! This crate provides:
//! - The `ArtifactStore` seam the batch runner hands finished outputs to
//! - A local filesystem store organised by media type and folder
//! - Cross-device file moves

pub mod error;
pub mod fs_utils;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use fs_utils::move_file;
pub use store::{ArtifactStore, LocalArtifactStore, SaveRequest};
