//! Sequential batch driver.
//!
//! Items run strictly in index order. For each item the runner picks the
//! command variants, allocates a scratch output, runs an [`EncoderSession`]
//! per variant until one succeeds, hands the output to the artifact store and
//! publishes state and progress on the bus. Every per-item failure ends as a
//! state emission plus an early return; nothing escapes [`BatchRunner::run`].

mod plan;
mod report;

pub use plan::{command_variants, with_output};
pub use report::{BatchOutcome, BatchReport};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::watch;

use clipfy_media::{
    image_progress, parse_progress, EncodeOutcome, EncoderBackend, EncoderSession, LogSink,
    TempFileManager,
};
use clipfy_models::{Batch, BatchKind, JobItem, ProcessingState, ProgressSample};
use clipfy_queue::BatchPublisher;
use clipfy_storage::{ArtifactStore, SaveRequest};

use crate::logging::BatchLogger;
use crate::metrics;

/// Message carried by the `Error` state when an item's commands all fail.
pub const EXECUTION_FAILED: &str = "execution failed";

/// Resources released on every exit from the item loop.
///
/// [`BatchResources::release`] is the normal path. `Drop` covers an aborted
/// task: it cancels the in-flight session and the scratch manager removes its
/// tracked files synchronously.
struct BatchResources {
    temps: TempFileManager,
    session: Option<Weak<EncoderSession>>,
}

impl BatchResources {
    fn new(work_dir: &Path) -> Self {
        Self {
            temps: TempFileManager::new(work_dir),
            session: None,
        }
    }

    fn track_session(&mut self, session: &Arc<EncoderSession>) {
        self.session = Some(Arc::downgrade(session));
    }

    fn cancel_session(&mut self) {
        if let Some(session) = self.session.take().and_then(|weak| weak.upgrade()) {
            session.cancel();
        }
    }

    async fn release(mut self) {
        self.temps.purge_all().await;
        self.cancel_session();
    }
}

impl Drop for BatchResources {
    fn drop(&mut self) {
        self.cancel_session();
    }
}

/// Drives one batch to completion or to a reported failure.
pub struct BatchRunner {
    backend: Arc<dyn EncoderBackend>,
    store: Arc<dyn ArtifactStore>,
    work_dir: PathBuf,
}

impl BatchRunner {
    pub fn new(
        backend: Arc<dyn EncoderBackend>,
        store: Arc<dyn ArtifactStore>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            store,
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Run every item of `batch`, publishing through `publisher`.
    ///
    /// Setting `cancel` stops the loop before the next item and kills the
    /// running encoder. Scratch files are purged on every exit path.
    pub async fn run(
        &self,
        batch: &Batch,
        publisher: &BatchPublisher,
        cancel: watch::Receiver<bool>,
    ) -> BatchReport {
        let logger = BatchLogger::new(&batch.id, batch.kind);
        logger.log_start(&format!("{} items into '{}'", batch.len(), batch.folder));
        metrics::record_batch_started(batch.kind);
        let started = Instant::now();

        let mut resources = BatchResources::new(&self.work_dir);
        let mut paths = Vec::new();
        let outcome = self
            .run_items(batch, publisher, cancel, &mut resources, &mut paths, &logger)
            .await;
        resources.release().await;

        metrics::record_batch_finished(batch.kind, outcome.as_str(), started.elapsed().as_secs_f64());
        match outcome {
            BatchOutcome::Completed => {
                logger.log_completion(&format!("{} outputs", paths.len()))
            }
            BatchOutcome::Cancelled { next_index } => logger.log_warning(&format!(
                "cancelled before item {} finished, {} outputs kept",
                next_index,
                paths.len()
            )),
            BatchOutcome::EncodeFailed { index } => {
                logger.log_error(&format!("item {} failed to encode", index))
            }
            BatchOutcome::SaveFailed { index } => {
                logger.log_error(&format!("item {} could not be saved", index))
            }
        }

        BatchReport::new(batch.id.clone(), batch.kind, paths, outcome)
    }

    async fn run_items(
        &self,
        batch: &Batch,
        publisher: &BatchPublisher,
        mut cancel: watch::Receiver<bool>,
        resources: &mut BatchResources,
        paths: &mut Vec<PathBuf>,
        logger: &BatchLogger,
    ) -> BatchOutcome {
        let total = batch.len();

        for item in &batch.items {
            let index = item.index;

            if *cancel.borrow() {
                return BatchOutcome::Cancelled { next_index: index };
            }

            let variants = command_variants(item, batch.kind);
            if variants.is_empty() {
                logger.log_warning(&format!("item {} has no command, skipping", index));
                metrics::record_item_skipped(batch.kind);
                continue;
            }

            let before = match batch.kind {
                BatchKind::Video => 0.0,
                BatchKind::Image => image_progress(index, total),
            };
            publisher.emit_progress(ProgressSample::new(before, index));

            let output = match resources.temps.allocate(&item.format).await {
                Ok(path) => path,
                Err(e) => {
                    logger.log_error(&format!("could not allocate scratch output: {}", e));
                    publisher.emit_state(ProcessingState::error(
                        format!("failed to prepare output: {}", e),
                        None,
                    ));
                    return BatchOutcome::EncodeFailed { index };
                }
            };

            let result = self
                .encode(batch.kind, item, &variants, &output, publisher, resources, &mut cancel)
                .await;

            if *cancel.borrow() {
                return BatchOutcome::Cancelled { next_index: index };
            }

            if !result.success {
                publisher.emit_state(ProcessingState::error(
                    EXECUTION_FAILED,
                    Some(non_empty_logs(result.logs)),
                ));
                return BatchOutcome::EncodeFailed { index };
            }

            if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
                let mut logs = result.logs;
                logs.push_str("encoder reported success but wrote no output file\n");
                publisher.emit_state(ProcessingState::error(EXECUTION_FAILED, Some(logs)));
                return BatchOutcome::EncodeFailed { index };
            }

            let request = SaveRequest {
                source: output.clone(),
                format: item.format.clone(),
                name: item.output_name(),
                folder: batch.folder.clone(),
            };
            let saved = match self.store.save(request).await {
                Ok(path) => path,
                Err(e) => {
                    logger.log_error(&format!("artifact store rejected item {}: {}", index, e));
                    publisher.emit_state(ProcessingState::error(
                        format!("failed to save output: {}", e),
                        None,
                    ));
                    return BatchOutcome::SaveFailed { index };
                }
            };

            if let Err(e) = resources.temps.promote(&output).await {
                logger.log_warning(&format!("could not release scratch file: {}", e));
            }
            paths.push(saved);
            metrics::record_item_processed(batch.kind);
            publisher.emit_state(ProcessingState::processed(paths));
            resources.temps.purge_unpromoted(paths).await;

            let after = match batch.kind {
                BatchKind::Video => 100.0,
                BatchKind::Image => image_progress(index + 1, total),
            };
            publisher.emit_progress(ProgressSample::new(after, index));
            logger.log_progress(&format!("item {} of {} done", index + 1, total));
        }

        publisher.emit_state(ProcessingState::completed(paths));
        BatchOutcome::Completed
    }

    /// Try each command variant in order, stopping at the first success.
    /// The last attempt's outcome is the item's outcome.
    #[allow(clippy::too_many_arguments)]
    async fn encode(
        &self,
        kind: BatchKind,
        item: &JobItem,
        variants: &[&str],
        output: &Path,
        publisher: &BatchPublisher,
        resources: &mut BatchResources,
        cancel: &mut watch::Receiver<bool>,
    ) -> EncodeOutcome {
        let mut outcome = EncodeOutcome {
            success: false,
            logs: String::new(),
        };

        for (attempt, command) in variants.iter().enumerate() {
            if attempt > 0 {
                if *cancel.borrow() {
                    break;
                }
                tracing::warn!(index = item.index, "Primary command failed, retrying with fallback");
                metrics::record_fallback_attempt(kind);
            }

            let command_line = with_output(command, output);
            let session = Arc::new(EncoderSession::new(self.backend.clone()));
            resources.track_session(&session);

            let started = Instant::now();
            outcome = run_session(&session, &command_line, progress_sink(kind, item, publisher), cancel).await;
            metrics::record_encoder_run(kind, outcome.success, started.elapsed().as_secs_f64());
            resources.session = None;

            if outcome.success {
                break;
            }
        }

        outcome
    }
}

/// Log sink feeding parsed progress into the bus. Image items have no
/// time-based progress.
fn progress_sink(kind: BatchKind, item: &JobItem, publisher: &BatchPublisher) -> LogSink {
    match kind {
        BatchKind::Video => {
            let publisher = publisher.clone();
            let index = item.index;
            let expected_ms = item.expected_duration_ms;
            Arc::new(move |line: &str| {
                if let Some(progress) = parse_progress(line, expected_ms) {
                    publisher.emit_progress(ProgressSample::new(progress, index));
                }
            })
        }
        BatchKind::Image => Arc::new(|_: &str| {}),
    }
}

/// Await the session, forwarding the batch cancel signal into it.
async fn run_session(
    session: &EncoderSession,
    command_line: &str,
    on_log: LogSink,
    cancel: &mut watch::Receiver<bool>,
) -> EncodeOutcome {
    if *cancel.borrow() {
        session.cancel();
    }

    let run = session.start(command_line, on_log);
    tokio::pin!(run);
    let mut watching_cancel = true;

    loop {
        tokio::select! {
            outcome = &mut run => return outcome,
            changed = cancel.changed(), if watching_cancel => match changed {
                Ok(()) => {
                    if *cancel.borrow_and_update() {
                        session.cancel();
                    }
                }
                Err(_) => watching_cancel = false,
            },
        }
    }
}

fn non_empty_logs(logs: String) -> String {
    if logs.trim().is_empty() {
        "encoder exited with failure and produced no output\n".to_string()
    } else {
        logs
    }
}
