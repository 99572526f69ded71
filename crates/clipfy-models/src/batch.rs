//! Batch and job item definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Unique identifier for a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub String);

impl BatchId {
    /// Generate a new random batch ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which runner variant drives the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    /// Time-based media with per-item progress parsed from encoder logs
    Video,
    /// Still images with coarse index-based progress
    Image,
}

impl BatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::Video => "video",
            BatchKind::Image => "image",
        }
    }

    /// Fallback format when an item does not name one.
    pub fn default_format(&self) -> &'static str {
        match self {
            BatchKind::Video => "mp4",
            BatchKind::Image => "jpg",
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata forwarded to the presentation layer (progress notification).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMeta {
    /// Notification title
    #[serde(default = "default_notification_title")]
    pub title: String,
    /// Platform-specific icon identifier
    #[serde(default)]
    pub icon: i32,
}

fn default_notification_title() -> String {
    "File under processing".to_string()
}

impl Default for NotificationMeta {
    fn default() -> Self {
        Self {
            title: default_notification_title(),
            icon: 0,
        }
    }
}

/// One unit of work within a batch.
///
/// Identity is the position in the batch; items run strictly in index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobItem {
    /// Position in the batch
    pub index: usize,
    /// Primary encoder command (without the output redirection)
    pub command: Option<String>,
    /// Alternate command tried once when the primary fails
    pub fallback_command: Option<String>,
    /// Original media path, used to derive the output name
    pub source_path: String,
    /// Target output format
    pub format: String,
    /// Expected duration in milliseconds (0 = unknown)
    pub expected_duration_ms: u64,
}

impl JobItem {
    /// Fallback command, if one exists and is non-empty.
    pub fn fallback(&self) -> Option<&str> {
        self.fallback_command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Suggested name for the persisted artifact: `<source stem>_process`.
    pub fn output_name(&self) -> String {
        let stem = Path::new(&self.source_path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "output".to_string());
        format!("{}_process", stem)
    }
}

/// Ordered set of items sharing one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Unique batch ID
    pub id: BatchId,
    /// Runner variant
    pub kind: BatchKind,
    /// Items in processing order
    pub items: Vec<JobItem>,
    /// Destination folder inside the artifact store
    pub folder: String,
    /// Presentation metadata
    #[serde(default)]
    pub notification: NotificationMeta,
}

impl Batch {
    /// Number of items, including those without a command.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
