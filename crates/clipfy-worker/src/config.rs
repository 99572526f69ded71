//! Worker configuration.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Work directory; scratch files live in `<work_dir>/encoder_scratch`
    pub work_dir: PathBuf,
    /// Encoder executable, resolved in PATH at launch time
    pub encoder_bin: String,
    /// Root of the local artifact store
    pub output_dir: PathBuf,
    /// Application folder between the media-type directory and the destination folder
    pub library_name: String,
    /// Prometheus exporter listen address (exporter disabled when unset)
    pub metrics_addr: Option<SocketAddr>,
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("clipfy")
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let work_dir = default_work_dir();
        Self {
            output_dir: work_dir.join("library"),
            work_dir,
            encoder_bin: "ffmpeg".to_string(),
            library_name: "Clipfy".to_string(),
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let work_dir = std::env::var("CLIPFY_WORK_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_work_dir);

        Self {
            output_dir: std::env::var("CLIPFY_OUTPUT_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| work_dir.join("library")),
            encoder_bin: std::env::var("CLIPFY_ENCODER_BIN")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "ffmpeg".to_string()),
            library_name: std::env::var("CLIPFY_LIBRARY_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Clipfy".to_string()),
            metrics_addr: std::env::var("CLIPFY_METRICS_ADDR")
                .ok()
                .and_then(|s| parse_metrics_addr(&s)),
            work_dir,
        }
    }

    /// Directory holding encoder scratch output.
    pub fn scratch_dir(&self) -> PathBuf {
        self.work_dir.join(clipfy_media::SCRATCH_DIR_NAME)
    }

    /// Reject settings the worker cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.work_dir.as_os_str().is_empty() {
            return Err(WorkerError::config("work directory is empty"));
        }
        if self.output_dir.starts_with(self.scratch_dir()) {
            return Err(WorkerError::config(
                "output directory must not live inside the scratch directory",
            ));
        }
        let mut components = Path::new(&self.library_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(()),
            _ => Err(WorkerError::config(format!(
                "library name '{}' must be a single folder name",
                self.library_name
            ))),
        }
    }
}

fn parse_metrics_addr(value: &str) -> Option<SocketAddr> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse() {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!("Ignoring invalid CLIPFY_METRICS_ADDR '{}': {}", value, e);
            None
        }
    }
}
