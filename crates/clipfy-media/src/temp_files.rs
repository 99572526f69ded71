//! Scratch files used as encoder output before promotion to permanent storage.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use clipfy_models::actual_extension;

use crate::error::MediaResult;

/// Directory name under the work dir that holds encoder scratch output.
pub const SCRATCH_DIR_NAME: &str = "encoder_scratch";

const TEMP_PREFIX: &str = "temp_";

/// Allocates and reclaims scratch output files for one batch.
///
/// The scratch directory is owned by a single in-flight batch, so any
/// `temp_*` file found there that is not explicitly kept is reclaimable.
/// A path leaves the tracked set once promoted and is never re-added.
#[derive(Debug)]
pub struct TempFileManager {
    dir: PathBuf,
    tracked: HashSet<PathBuf>,
    counter: u64,
}

impl TempFileManager {
    /// Create a manager rooted at `<work_dir>/encoder_scratch`.
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: work_dir.as_ref().join(SCRATCH_DIR_NAME),
            tracked: HashSet::new(),
            counter: 0,
        }
    }

    /// Scratch directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `path` is still tracked (allocated and not yet promoted or purged).
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.tracked.contains(path)
    }

    /// Number of tracked scratch files.
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Allocate a new unique scratch path for `format` and start tracking it.
    ///
    /// The file itself is not created; the encoder writes it.
    pub async fn allocate(&mut self, format: &str) -> MediaResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let millis = chrono::Utc::now().timestamp_millis();
        let path = loop {
            self.counter += 1;
            let candidate = self.dir.join(format!(
                "{}{}_{}.{}",
                TEMP_PREFIX,
                millis,
                self.counter,
                actual_extension(format)
            ));
            if !self.tracked.contains(&candidate) && !tokio::fs::try_exists(&candidate).await? {
                break candidate;
            }
        };

        debug!(path = %path.display(), "Allocated scratch file");
        self.tracked.insert(path.clone());
        Ok(path)
    }

    /// Release a scratch file after its content reached permanent storage.
    ///
    /// Stops tracking the path and removes the scratch copy if the store left
    /// one behind.
    pub async fn promote(&mut self, path: &Path) -> MediaResult<()> {
        self.tracked.remove(path);
        remove_if_exists(path).await?;
        Ok(())
    }

    /// Delete every tracked scratch file plus any stray `temp_*` file left in
    /// the scratch directory, then clear the tracked set.
    ///
    /// Idempotent; files already gone are not an error. Returns the number of
    /// files removed.
    pub async fn purge_all(&mut self) -> usize {
        self.purge_unpromoted(&[]).await
    }

    /// Reclaim scratch files mid-batch, keeping anything listed in `excluding`.
    pub async fn purge_unpromoted(&mut self, excluding: &[PathBuf]) -> usize {
        let keep: HashSet<&Path> = excluding.iter().map(PathBuf::as_path).collect();
        let mut candidates: HashSet<PathBuf> = self
            .tracked
            .iter()
            .filter(|p| !keep.contains(p.as_path()))
            .cloned()
            .collect();

        match self.stray_files().await {
            Ok(stray) => candidates.extend(stray.into_iter().filter(|p| !keep.contains(p.as_path()))),
            Err(e) => debug!("Could not scan scratch directory: {}", e),
        }

        let mut removed = 0;
        for path in candidates {
            match remove_if_exists(&path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(path = %path.display(), "Failed to remove scratch file: {}", e),
            }
            self.tracked.remove(&path);
        }

        if removed > 0 {
            debug!(removed, "Purged scratch files");
        }
        removed
    }

    async fn stray_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let is_temp = entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(TEMP_PREFIX))
                .unwrap_or(false);
            if is_temp && entry.file_type().await?.is_file() {
                found.push(entry.path());
            }
        }
        Ok(found)
    }
}

impl Drop for TempFileManager {
    fn drop(&mut self) {
        for path in self.tracked.drain() {
            let _ = std::fs::remove_file(&path);
        }
    }
}

/// Remove a file, treating "not found" as already removed.
async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
