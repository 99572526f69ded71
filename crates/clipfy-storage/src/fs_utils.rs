//! Filesystem utilities for cross-device file operations.
//!
//! Scratch files usually live on a different filesystem than the library,
//! so a plain rename can fail with EXDEV.

use std::path::Path;
use tokio::fs;

use crate::error::{StorageError, StorageResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Attempts a rename first and falls back to copy-and-delete on EXDEV. The
/// copy goes to a sibling `.part` file that is renamed into place, so `dst`
/// never holds a partial artifact.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> StorageResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::from_write(e, parent))?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(StorageError::from_write(e, dst)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> StorageResult<()> {
    let partial = dst.with_extension("part");

    if let Err(e) = fs::copy(src, &partial).await {
        let _ = fs::remove_file(&partial).await;
        tracing::error!(
            "Failed to copy file during cross-device move: {} -> {}: {}",
            src.display(),
            partial.display(),
            e
        );
        return Err(StorageError::from_write(e, dst));
    }

    if let Err(e) = fs::rename(&partial, dst).await {
        let _ = fs::remove_file(&partial).await;
        return Err(StorageError::from_write(e, dst));
    }

    // The artifact is in place; a leftover scratch copy is reclaimed later.
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}
