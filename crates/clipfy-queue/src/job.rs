//! Enqueue descriptors for video and image batches.
//!
//! Descriptors carry index-aligned lists as received from the caller.
//! [`BatchJob::into_batch`] validates them and builds the per-item view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clipfy_models::{Batch, BatchId, BatchKind, JobItem, NotificationMeta};

use crate::error::{QueueError, QueueResult};

/// Batch of video conversions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoBatchJob {
    /// Unique batch ID
    #[serde(default)]
    pub batch_id: BatchId,
    /// Primary encoder commands
    pub commands: Vec<String>,
    /// Alternate commands; may be shorter than `commands`
    #[serde(default)]
    pub fallback_commands: Vec<String>,
    /// Source media paths, one per item
    pub source_paths: Vec<String>,
    /// Output formats, one per item
    pub formats: Vec<String>,
    /// Expected durations in milliseconds, one per item
    pub durations_ms: Vec<u64>,
    /// Destination folder in the artifact store
    pub folder: String,
    /// Presentation metadata
    #[serde(default)]
    pub notification: NotificationMeta,
    /// When the job was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl VideoBatchJob {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            batch_id: BatchId::new(),
            commands: Vec::new(),
            fallback_commands: Vec::new(),
            source_paths: Vec::new(),
            formats: Vec::new(),
            durations_ms: Vec::new(),
            folder: folder.into(),
            notification: NotificationMeta::default(),
            created_at: Utc::now(),
        }
    }

    /// Append one item.
    pub fn with_item(
        mut self,
        command: impl Into<String>,
        source_path: impl Into<String>,
        format: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        self.commands.push(command.into());
        self.source_paths.push(source_path.into());
        self.formats.push(format.into());
        self.durations_ms.push(duration_ms);
        self
    }

    /// Set the full fallback list (index-aligned with the items).
    pub fn with_fallbacks<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_commands = fallbacks.into_iter().map(Into::into).collect();
        self
    }

    /// Set notification metadata.
    pub fn with_notification(mut self, notification: NotificationMeta) -> Self {
        self.notification = notification;
        self
    }

    fn validate(&self) -> QueueResult<()> {
        validate_common(&self.commands, &self.source_paths, &self.formats)?;
        if self.durations_ms.len() < self.source_paths.len() {
            return Err(QueueError::invalid_batch(format!(
                "{} durations for {} items",
                self.durations_ms.len(),
                self.source_paths.len()
            )));
        }
        Ok(())
    }
}

/// Batch of image conversions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageBatchJob {
    /// Unique batch ID
    #[serde(default)]
    pub batch_id: BatchId,
    /// Encoder commands
    pub commands: Vec<String>,
    /// Source image paths, one per item
    pub source_paths: Vec<String>,
    /// Output formats, one per item
    pub formats: Vec<String>,
    /// Destination folder in the artifact store
    pub folder: String,
    /// Presentation metadata
    #[serde(default)]
    pub notification: NotificationMeta,
    /// When the job was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ImageBatchJob {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            batch_id: BatchId::new(),
            commands: Vec::new(),
            source_paths: Vec::new(),
            formats: Vec::new(),
            folder: folder.into(),
            notification: NotificationMeta::default(),
            created_at: Utc::now(),
        }
    }

    /// Append one item.
    pub fn with_item(
        mut self,
        command: impl Into<String>,
        source_path: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        self.commands.push(command.into());
        self.source_paths.push(source_path.into());
        self.formats.push(format.into());
        self
    }

    /// Set notification metadata.
    pub fn with_notification(mut self, notification: NotificationMeta) -> Self {
        self.notification = notification;
        self
    }
}

fn validate_common(commands: &[String], source_paths: &[String], formats: &[String]) -> QueueResult<()> {
    if commands.is_empty() {
        return Err(QueueError::invalid_batch("no commands supplied"));
    }
    if source_paths.is_empty() {
        return Err(QueueError::invalid_batch("no source paths supplied"));
    }
    if formats.len() < source_paths.len() {
        return Err(QueueError::invalid_batch(format!(
            "{} formats for {} items",
            formats.len(),
            source_paths.len()
        )));
    }
    Ok(())
}

/// Non-blank entry at `index`, if any.
fn get_or_skip(list: &[String], index: usize) -> Option<String> {
    list.get(index)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn format_or_default(formats: &[String], index: usize, kind: BatchKind) -> String {
    get_or_skip(formats, index).unwrap_or_else(|| kind.default_format().to_string())
}

/// Generic batch wrapper accepted by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchJob {
    Video(VideoBatchJob),
    Image(ImageBatchJob),
}

impl BatchJob {
    pub fn batch_id(&self) -> &BatchId {
        match self {
            BatchJob::Video(j) => &j.batch_id,
            BatchJob::Image(j) => &j.batch_id,
        }
    }

    pub fn kind(&self) -> BatchKind {
        match self {
            BatchJob::Video(_) => BatchKind::Video,
            BatchJob::Image(_) => BatchKind::Image,
        }
    }

    pub fn notification(&self) -> &NotificationMeta {
        match self {
            BatchJob::Video(j) => &j.notification,
            BatchJob::Image(j) => &j.notification,
        }
    }

    /// Parse a descriptor from JSON.
    pub fn from_json(json: &str) -> QueueResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate inputs. Failures here are data errors: no state is emitted.
    pub fn validate(&self) -> QueueResult<()> {
        match self {
            BatchJob::Video(j) => j.validate(),
            BatchJob::Image(j) => validate_common(&j.commands, &j.source_paths, &j.formats),
        }
    }

    /// Validate and build the index-aligned item list.
    ///
    /// The item count equals the number of source paths. Missing or blank
    /// commands become items without a command (skipped at run time); missing
    /// fallbacks mean "no fallback".
    pub fn into_batch(self) -> QueueResult<Batch> {
        self.validate()?;
        let kind = self.kind();

        let batch = match self {
            BatchJob::Video(job) => {
                let items = (0..job.source_paths.len())
                    .map(|i| JobItem {
                        index: i,
                        command: get_or_skip(&job.commands, i),
                        fallback_command: get_or_skip(&job.fallback_commands, i),
                        source_path: job.source_paths[i].clone(),
                        format: format_or_default(&job.formats, i, kind),
                        expected_duration_ms: job.durations_ms[i],
                    })
                    .collect();
                Batch {
                    id: job.batch_id,
                    kind,
                    items,
                    folder: job.folder,
                    notification: job.notification,
                }
            }
            BatchJob::Image(job) => {
                let items = (0..job.source_paths.len())
                    .map(|i| JobItem {
                        index: i,
                        command: get_or_skip(&job.commands, i),
                        fallback_command: None,
                        source_path: job.source_paths[i].clone(),
                        format: format_or_default(&job.formats, i, kind),
                        expected_duration_ms: 0,
                    })
                    .collect();
                Batch {
                    id: job.batch_id,
                    kind,
                    items,
                    folder: job.folder,
                    notification: job.notification,
                }
            }
        };

        Ok(batch)
    }
}

impl From<VideoBatchJob> for BatchJob {
    fn from(job: VideoBatchJob) -> Self {
        BatchJob::Video(job)
    }
}

impl From<ImageBatchJob> for BatchJob {
    fn from(job: ImageBatchJob) -> Self {
        BatchJob::Image(job)
    }
}
