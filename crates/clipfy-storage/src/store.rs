//! Artifact store: persists a finished scratch file to permanent storage.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use clipfy_models::{actual_extension, mime_type, MediaKind};

use crate::error::{StorageError, StorageResult};
use crate::fs_utils::move_file;

/// One hand-off from the batch runner to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    /// Scratch file written by the encoder
    pub source: PathBuf,
    /// Target output format
    pub format: String,
    /// Suggested artifact name without extension
    pub name: String,
    /// Destination folder
    pub folder: String,
}

/// Persists finished outputs. Any error aborts the batch; saves are not retried.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Save `request.source` and return the permanent path.
    async fn save(&self, request: SaveRequest) -> StorageResult<PathBuf>;
}

/// Filesystem store laid out as `<root>/<Pictures|Movies|Music>/<library>/<folder>/`.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    library_name: String,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, library_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            library_name: library_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that receives artifacts of `kind` for `folder`.
    pub fn target_dir(&self, kind: MediaKind, folder: &str) -> PathBuf {
        let media_dir = match kind {
            MediaKind::Image => "Pictures",
            MediaKind::Video => "Movies",
            MediaKind::Audio => "Music",
        };
        let mut dir = self.root.join(media_dir).join(&self.library_name);
        // Only plain components; the folder name must not escape the library.
        for component in Path::new(folder).components() {
            if let Component::Normal(part) = component {
                dir.push(part);
            }
        }
        dir
    }
}

/// First free `<name>.<ext>`, `<name>_1.<ext>`, `<name>_2.<ext>`, ... in `dir`.
async fn unique_target(dir: &Path, name: &str, ext: &str) -> StorageResult<PathBuf> {
    let mut candidate = dir.join(format!("{}.{}", name, ext));
    let mut counter = 1u32;
    while tokio::fs::try_exists(&candidate).await? {
        candidate = dir.join(format!("{}_{}.{}", name, counter, ext));
        counter += 1;
    }
    Ok(candidate)
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn save(&self, request: SaveRequest) -> StorageResult<PathBuf> {
        let kind = MediaKind::from_format(&request.format)
            .ok_or_else(|| StorageError::unsupported_format(&request.format))?;

        if !tokio::fs::try_exists(&request.source).await? {
            return Err(StorageError::SourceMissing(request.source));
        }

        let dir = self.target_dir(kind, &request.folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::from_write(e, &dir))?;

        let name = if request.name.trim().is_empty() {
            "output"
        } else {
            request.name.trim()
        };
        let target = unique_target(&dir, name, &actual_extension(&request.format)).await?;
        debug!(
            source = %request.source.display(),
            target = %target.display(),
            "Saving artifact"
        );

        move_file(&request.source, &target).await?;
        info!(
            path = %target.display(),
            kind = kind.as_str(),
            mime = mime_type(&request.format).unwrap_or("application/octet-stream"),
            "Artifact saved"
        );
        Ok(target)
    }
}
