//! Batch executor.
//!
//! A single worker slot shared by video and image batches (they share the
//! scratch directory). Enqueueing while a batch runs cancels and awaits the
//! running batch before the new one starts.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{info, warn, Instrument};

use clipfy_media::{EncoderBackend, FfmpegProcess};
use clipfy_models::BatchId;
use clipfy_queue::{BatchJob, QueueError, StateBus};
use clipfy_storage::{ArtifactStore, LocalArtifactStore};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::BatchLogger;
use crate::runner::{BatchReport, BatchRunner};

/// Handle to one spawned batch.
#[derive(Clone)]
pub struct BatchHandle {
    batch_id: BatchId,
    cancel: Arc<watch::Sender<bool>>,
    done: watch::Receiver<Option<BatchReport>>,
}

impl BatchHandle {
    pub fn batch_id(&self) -> &BatchId {
        &self.batch_id
    }

    /// Request cancellation. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.done.borrow().is_some()
    }

    /// Wait for the batch to finish.
    pub async fn wait(&self) -> WorkerResult<BatchReport> {
        let mut done = self.done.clone();
        let report = done
            .wait_for(Option::is_some)
            .await
            .map_err(|_| WorkerError::join(format!("batch {} ended without a report", self.batch_id)))?;
        report
            .clone()
            .ok_or_else(|| WorkerError::join("batch report missing"))
    }
}

impl std::fmt::Debug for BatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchHandle")
            .field("batch_id", &self.batch_id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Dispatcher owning the state bus, encoder backend and artifact store.
pub struct BatchExecutor {
    runner: Arc<BatchRunner>,
    bus: StateBus,
    active: Mutex<Option<BatchHandle>>,
}

impl BatchExecutor {
    pub fn new(
        backend: Arc<dyn EncoderBackend>,
        store: Arc<dyn ArtifactStore>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner: Arc::new(BatchRunner::new(backend, store, work_dir)),
            bus: StateBus::new(),
            active: Mutex::new(None),
        }
    }

    /// Build an executor backed by the real encoder and the local library.
    pub fn from_config(config: &WorkerConfig) -> Self {
        let backend = Arc::new(FfmpegProcess::new(config.encoder_bin.clone()));
        let store = Arc::new(LocalArtifactStore::new(
            config.output_dir.clone(),
            config.library_name.clone(),
        ));
        Self::new(backend, store, config.work_dir.clone())
    }

    /// Bus carrying the current batch's state and progress.
    pub fn bus(&self) -> &StateBus {
        &self.bus
    }

    /// Validate `job`, replace any running batch and start it.
    ///
    /// Invalid input fails here with a data error; nothing is published.
    pub async fn enqueue(&self, job: BatchJob) -> WorkerResult<BatchHandle> {
        let batch = job.into_batch().map_err(|e| match e {
            QueueError::InvalidBatch(msg) => {
                warn!("Rejected batch: {}", msg);
                WorkerError::data(msg)
            }
            other => WorkerError::from(other),
        })?;

        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            if !previous.is_finished() {
                info!(
                    previous = %previous.batch_id(),
                    next = %batch.id,
                    "Replacing running batch"
                );
                previous.cancel();
            }
            if let Err(e) = previous.wait().await {
                warn!("Previous batch did not finish cleanly: {}", e);
            }
        }

        // Happens-before edge: the new generation is open before the loop starts.
        let publisher = self.bus.reset_flow();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(None);
        let handle = BatchHandle {
            batch_id: batch.id.clone(),
            cancel: Arc::new(cancel_tx),
            done: done_rx,
        };

        let runner = self.runner.clone();
        let span = BatchLogger::new(&batch.id, batch.kind).create_span();
        tokio::spawn(
            async move {
                let report = runner.run(&batch, &publisher, cancel_rx).await;
                done_tx.send_replace(Some(report));
            }
            .instrument(span),
        );

        *active = Some(handle.clone());
        Ok(handle)
    }

    /// Cancel the running batch. Returns `false` when nothing was running.
    pub async fn cancel(&self) -> bool {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(handle) if !handle.is_finished() => {
                info!(batch_id = %handle.batch_id(), "Cancelling batch");
                handle.cancel();
                true
            }
            _ => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}
