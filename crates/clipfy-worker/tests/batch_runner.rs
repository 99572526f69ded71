//! Batch runner behaviour against a scripted encoder.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use tempfile::TempDir;
use tokio::sync::watch;

use clipfy_models::{ProcessingState, ProgressSample};
use clipfy_queue::{BatchJob, BusEvent, ImageBatchJob, StateBus, VideoBatchJob};
use clipfy_storage::{ArtifactStore, LocalArtifactStore, SaveRequest, StorageError, StorageResult};
use clipfy_worker::{BatchOutcome, BatchReport, BatchRunner};

use common::{scratch_files, status_lines, Behavior, Recorder, ScriptedEncoder};

mock! {
    pub Store {}

    #[async_trait]
    impl ArtifactStore for Store {
        async fn save(&self, request: SaveRequest) -> StorageResult<PathBuf>;
    }
}

struct Harness {
    work: TempDir,
    library: TempDir,
    bus: StateBus,
    recorder: Recorder,
    runner: BatchRunner,
}

impl Harness {
    fn new(encoder: Arc<ScriptedEncoder>) -> Self {
        let library = TempDir::new().unwrap();
        let store = Arc::new(LocalArtifactStore::new(library.path(), "Clipfy"));
        Self::with_store(encoder, store, library)
    }

    fn with_store(encoder: Arc<ScriptedEncoder>, store: Arc<dyn ArtifactStore>, library: TempDir) -> Self {
        let work = TempDir::new().unwrap();
        let bus = StateBus::new();
        let recorder = Recorder::attach(&bus);
        let runner = BatchRunner::new(encoder, store, work.path());
        Self {
            work,
            library,
            bus,
            recorder,
            runner,
        }
    }

    async fn run(&self, job: impl Into<BatchJob>) -> BatchReport {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_with_cancel(job, cancel_rx).await
    }

    async fn run_with_cancel(&self, job: impl Into<BatchJob>, cancel: watch::Receiver<bool>) -> BatchReport {
        let batch = job.into().into_batch().unwrap();
        let publisher = self.bus.reset_flow();
        self.runner.run(&batch, &publisher, cancel).await
    }

    fn movies(&self, name: &str) -> PathBuf {
        self.library.path().join("Movies/Clipfy/Trimmed").join(name)
    }
}

fn three_videos() -> VideoBatchJob {
    VideoBatchJob::new("Trimmed")
        .with_item("-i /media/first.mov -c:v libx264", "/media/first.mov", "mp4", 10_000)
        .with_item("-i /media/second.mov -c:v libx264", "/media/second.mov", "mp4", 0)
        .with_item("-i /media/third.mov -c:v libx264", "/media/third.mov", "mp4", 5_000)
}

fn progress_for(recorder: &Recorder, index: usize) -> Vec<f32> {
    recorder
        .progress()
        .into_iter()
        .filter(|p| p.index == index)
        .map(|p| p.progress)
        .collect()
}

#[tokio::test]
async fn test_all_items_succeed_emits_processed_then_completed() {
    let encoder = ScriptedEncoder::new().on(
        "first.mov",
        Behavior::Succeed(status_lines(&["00:00:02.50", "00:00:05.00", "00:00:10.00"])),
    );
    let h = Harness::new(encoder.clone());

    let report = h.run(three_videos()).await;

    assert!(report.success);
    assert_eq!(report.outcome, BatchOutcome::Completed);
    let expected = vec![
        h.movies("first_process.mp4"),
        h.movies("second_process.mp4"),
        h.movies("third_process.mp4"),
    ];
    assert_eq!(report.paths, expected);
    assert!(expected.iter().all(|p| p.exists()));

    let states = h.recorder.states();
    assert_eq!(
        states,
        vec![
            ProcessingState::processed(&expected[..1]),
            ProcessingState::processed(&expected[..2]),
            ProcessingState::processed(&expected[..3]),
            ProcessingState::completed(&expected),
        ]
    );
    assert_eq!(
        h.recorder.events().last(),
        Some(&BusEvent::State(ProcessingState::completed(&expected)))
    );

    // Time-based progress climbs towards 100 for the item with a known duration.
    assert_eq!(progress_for(&h.recorder, 0), vec![0.0, 25.0, 50.0, 100.0, 100.0]);
    assert_eq!(progress_for(&h.recorder, 1), vec![0.0, 100.0]);
    assert_eq!(encoder.calls().len(), 3);
    assert!(scratch_files(h.work.path()).is_empty());
}

#[tokio::test]
async fn test_every_command_gets_output_redirection() {
    let encoder = ScriptedEncoder::new();
    let h = Harness::new(encoder.clone());

    h.run(three_videos()).await;

    for call in encoder.calls() {
        assert!(call.contains(" -y \""));
        assert!(call.contains("encoder_scratch"));
    }
}

#[tokio::test]
async fn test_fallback_success_replaces_primary_failure() {
    let encoder = ScriptedEncoder::new()
        .on("libx265", Behavior::Fail(vec!["Unknown encoder 'libx265'".to_string()]));
    let h = Harness::new(encoder.clone());

    let job = VideoBatchJob::new("Trimmed")
        .with_item("-i /media/first.mov -c:v libx265", "/media/first.mov", "mp4", 1_000)
        .with_fallbacks(["-i /media/first.mov -c:v libx264"]);
    let report = h.run(job).await;

    assert!(report.success);
    assert_eq!(report.paths, vec![h.movies("first_process.mp4")]);
    assert_eq!(h.recorder.count("error"), 0);
    assert_eq!(h.recorder.count("completed"), 1);

    let calls = encoder.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].contains("libx265"));
    assert!(calls[1].contains("libx264"));
    // Both attempts target the same scratch output.
    let output = |call: &str| call.rsplit(" -y ").next().unwrap().to_string();
    assert_eq!(output(&calls[0]), output(&calls[1]));
}

#[tokio::test]
async fn test_both_commands_fail_aborts_batch() {
    let encoder = ScriptedEncoder::new()
        .on("primary-broken", Behavior::Fail(vec!["primary log".to_string()]))
        .on("fallback-broken", Behavior::Fail(vec!["fallback log".to_string()]));
    let h = Harness::new(encoder.clone());

    let job = VideoBatchJob::new("Trimmed")
        .with_item("-i /media/first.mov", "/media/first.mov", "mp4", 1_000)
        .with_item("-i /media/second.mov primary-broken", "/media/second.mov", "mp4", 1_000)
        .with_item("-i /media/third.mov", "/media/third.mov", "mp4", 1_000)
        .with_fallbacks(["", "-i /media/second.mov fallback-broken"]);
    let report = h.run(job).await;

    assert!(!report.success);
    assert_eq!(report.outcome, BatchOutcome::EncodeFailed { index: 1 });
    assert_eq!(report.paths, vec![h.movies("first_process.mp4")]);

    let errors: Vec<_> = h
        .recorder
        .states()
        .into_iter()
        .filter(|s| s.as_str() == "error")
        .collect();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ProcessingState::Error { message, ffmpeg_logs } => {
            assert_eq!(message, "execution failed");
            let logs = ffmpeg_logs.as_deref().unwrap();
            assert!(logs.contains("fallback log"));
            assert!(!logs.contains("primary log"));
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(h.recorder.count("completed"), 0);
    assert_eq!(h.recorder.states().last().map(|s| s.as_str()), Some("error"));
    assert_eq!(encoder.calls_containing("third.mov"), 0);
    assert!(scratch_files(h.work.path()).is_empty());
}

#[tokio::test]
async fn test_failure_without_logs_still_reports_diagnostic() {
    let encoder = ScriptedEncoder::new().on("first.mov", Behavior::Fail(Vec::new()));
    let h = Harness::new(encoder);

    let job = VideoBatchJob::new("Trimmed").with_item("-i /media/first.mov", "/media/first.mov", "mp4", 0);
    h.run(job).await;

    match h.recorder.states().last() {
        Some(ProcessingState::Error { ffmpeg_logs: Some(logs), .. }) => assert!(!logs.trim().is_empty()),
        other => panic!("unexpected state {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_before_item_stops_loop() {
    let encoder = ScriptedEncoder::new();
    let h = Harness::new(encoder.clone());

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let cancel_tx = Arc::new(cancel_tx);
    let trigger = cancel_tx.clone();
    let _listener = h.bus.listen(move |event| {
        if let BusEvent::State(ProcessingState::Processed { paths }) = event {
            if paths.len() == 2 {
                trigger.send_replace(true);
            }
        }
    });

    let job = three_videos().with_item("-i /media/fourth.mov", "/media/fourth.mov", "mp4", 0);
    let report = h.run_with_cancel(job, cancel_rx).await;

    assert!(!report.success);
    assert_eq!(report.outcome, BatchOutcome::Cancelled { next_index: 2 });
    assert_eq!(report.paths.len(), 2);
    assert_eq!(encoder.calls().len(), 2);
    assert_eq!(encoder.calls_containing("third.mov"), 0);
    assert_eq!(h.recorder.count("completed"), 0);
    assert_eq!(h.recorder.count("error"), 0);
    assert!(scratch_files(h.work.path()).is_empty());
}

#[tokio::test]
async fn test_cancel_kills_in_flight_encoder() {
    let encoder = ScriptedEncoder::new().on("second.mov", Behavior::Hang(vec!["frame=1".to_string()]));
    let h = Harness::new(encoder.clone());
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let mut progress = h.bus.subscribe_progress();
    let canceller = async {
        progress.wait_for(|p: &ProgressSample| p.index == 1).await;
        cancel_tx.send_replace(true);
    };

    let (report, ()) = tokio::time::timeout(
        Duration::from_secs(5),
        async { tokio::join!(h.run_with_cancel(three_videos(), cancel_rx), canceller) },
    )
    .await
    .expect("cancelled batch should finish");

    assert_eq!(report.outcome, BatchOutcome::Cancelled { next_index: 1 });
    assert_eq!(report.paths.len(), 1);
    assert_eq!(h.recorder.count("error"), 0);
    assert_eq!(h.recorder.count("completed"), 0);
    assert_eq!(encoder.calls_containing("third.mov"), 0);
    assert!(scratch_files(h.work.path()).is_empty());
}

#[tokio::test]
async fn test_items_without_command_are_skipped() {
    let encoder = ScriptedEncoder::new();
    let h = Harness::new(encoder.clone());

    let mut job = three_videos();
    job.commands[1] = "   ".to_string();
    let report = h.run(job).await;

    assert!(report.success);
    assert_eq!(
        report.paths,
        vec![h.movies("first_process.mp4"), h.movies("third_process.mp4")]
    );
    assert_eq!(encoder.calls().len(), 2);
    assert!(progress_for(&h.recorder, 1).is_empty());
}

#[tokio::test]
async fn test_image_launch_failure_reports_error_without_outputs() {
    let encoder = ScriptedEncoder::new().on(
        "broken.png",
        Behavior::LaunchError("unterminated double quote".to_string()),
    );
    let h = Harness::new(encoder.clone());

    let job = ImageBatchJob::new("Stickers")
        .with_item("-i \"/media/broken.png", "/media/broken.png", "webp")
        .with_item("-i /media/fine.png", "/media/fine.png", "webp");
    let report = h.run(job).await;

    assert!(!report.success);
    assert!(report.paths.is_empty());
    assert_eq!(report.outcome, BatchOutcome::EncodeFailed { index: 0 });
    assert_eq!(h.recorder.count("processed"), 0);

    let states = h.recorder.states();
    assert_eq!(states.len(), 1);
    match &states[0] {
        ProcessingState::Error { ffmpeg_logs: Some(logs), .. } => {
            assert!(logs.contains("unterminated double quote"))
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(encoder.calls_containing("fine.png"), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_real_encoder_malformed_command_is_launch_failure() {
    use clipfy_media::FfmpegProcess;

    let library = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let bus = StateBus::new();
    let recorder = Recorder::attach(&bus);
    let runner = BatchRunner::new(
        Arc::new(FfmpegProcess::new("sh")),
        Arc::new(LocalArtifactStore::new(library.path(), "Clipfy")),
        work.path(),
    );

    let batch = BatchJob::from(
        ImageBatchJob::new("Stickers").with_item("-c 'echo \"unbalanced", "/media/a.png", "png"),
    )
    .into_batch()
    .unwrap();
    let (_tx, rx) = watch::channel(false);
    let report = runner.run(&batch, &bus.reset_flow(), rx).await;

    assert_eq!(report.outcome, BatchOutcome::EncodeFailed { index: 0 });
    match recorder.states().as_slice() {
        [ProcessingState::Error { ffmpeg_logs: Some(logs), .. }] => {
            assert!(logs.contains("Malformed command line"))
        }
        other => panic!("unexpected states {:?}", other),
    }
    assert!(scratch_files(work.path()).is_empty());
}

#[tokio::test]
async fn test_image_progress_is_index_based() {
    let encoder = ScriptedEncoder::new();
    let h = Harness::new(encoder);

    let job = ImageBatchJob::new("Stickers")
        .with_item("-i /media/a.png", "/media/a.png", "webp")
        .with_item("-i /media/b.png", "/media/b.png", "webp");
    let report = h.run(job).await;

    assert!(report.success);
    assert_eq!(
        h.recorder.progress(),
        vec![
            ProgressSample::new(0.0, 0),
            ProgressSample::new(50.0, 0),
            ProgressSample::new(50.0, 1),
            ProgressSample::new(100.0, 1),
        ]
    );
    assert!(report.paths[0].starts_with(h.library.path().join("Pictures/Clipfy/Stickers")));
}

#[tokio::test]
async fn test_missing_output_file_is_execution_failure() {
    let encoder = ScriptedEncoder::new().on("first.mov", Behavior::SucceedWithoutOutput);
    let h = Harness::new(encoder);

    let report = h.run(three_videos()).await;

    assert_eq!(report.outcome, BatchOutcome::EncodeFailed { index: 0 });
    match h.recorder.states().last() {
        Some(ProcessingState::Error { message, ffmpeg_logs: Some(logs) }) => {
            assert_eq!(message, "execution failed");
            assert!(logs.contains("no output file"));
        }
        other => panic!("unexpected state {:?}", other),
    }
}

#[tokio::test]
async fn test_store_failure_emits_error_and_aborts() {
    let mut store = MockStore::new();
    store
        .expect_save()
        .times(1)
        .returning(|_| Err(StorageError::write_denied("library is read-only")));

    let encoder = ScriptedEncoder::new();
    let h = Harness::with_store(encoder.clone(), Arc::new(store), TempDir::new().unwrap());

    let report = h.run(three_videos()).await;

    assert!(!report.success);
    assert_eq!(report.outcome, BatchOutcome::SaveFailed { index: 0 });
    assert!(report.paths.is_empty());
    assert_eq!(encoder.calls().len(), 1);
    match h.recorder.states().as_slice() {
        [ProcessingState::Error { message, ffmpeg_logs: None }] => {
            assert!(message.starts_with("failed to save output"));
            assert!(message.contains("read-only"));
        }
        other => panic!("unexpected states {:?}", other),
    }
    assert!(scratch_files(h.work.path()).is_empty());
}

#[tokio::test]
async fn test_store_receives_suggested_name_and_folder() {
    let mut store = MockStore::new();
    store
        .expect_save()
        .withf(|req: &SaveRequest| {
            req.name == "first_process" && req.folder == "Trimmed" && req.format == "matroska"
        })
        .times(1)
        .returning(|req| Ok(PathBuf::from("/library").join(format!("{}.mkv", req.name))));

    let encoder = ScriptedEncoder::new();
    let h = Harness::with_store(encoder, Arc::new(store), TempDir::new().unwrap());

    let job = VideoBatchJob::new("Trimmed").with_item("-i /media/first.mov", "/media/first.mov", "matroska", 0);
    let report = h.run(job).await;

    assert!(report.success);
    assert_eq!(report.paths, vec![PathBuf::from("/library/first_process.mkv")]);
    // The mock leaves the scratch copy behind; promotion reclaims it.
    assert!(scratch_files(h.work.path()).is_empty());
}
