//! Shared fixtures for worker integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use clipfy_media::{split_command_line, EncoderBackend, LogSink, MediaError, MediaResult, ProcessExit};
use clipfy_models::{ProcessingState, ProgressSample};
use clipfy_queue::{BusEvent, ListenerHandle, StateBus};

/// What the fake encoder does for a matching command.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Print `lines`, write the output file and exit 0
    Succeed(Vec<String>),
    /// Print `lines` and exit 1 without writing output
    Fail(Vec<String>),
    /// Exit 0 without writing the output file
    SucceedWithoutOutput,
    /// Refuse to launch
    LaunchError(String),
    /// Print `lines` and run until cancelled
    Hang(Vec<String>),
}

/// Encoder backend driven by substring rules; unmatched commands succeed.
#[derive(Default)]
pub struct ScriptedEncoder {
    rules: Mutex<Vec<(String, Behavior)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEncoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Commands containing `needle` get `behavior`. First matching rule wins.
    pub fn on(self: &Arc<Self>, needle: &str, behavior: Behavior) -> Arc<Self> {
        self.rules
            .lock()
            .unwrap()
            .push((needle.to_string(), behavior));
        self.clone()
    }

    /// Every command line received, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(needle)).count()
    }

    fn behavior_for(&self, command_line: &str) -> Behavior {
        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| command_line.contains(needle.as_str()))
            .map(|(_, b)| b.clone())
            .unwrap_or(Behavior::Succeed(Vec::new()))
    }
}

fn emit(lines: &[String], on_log: &LogSink, logs: &mut String) {
    for line in lines {
        on_log(line);
        logs.push_str(line);
        logs.push('\n');
    }
}

#[async_trait]
impl EncoderBackend for ScriptedEncoder {
    async fn execute(
        &self,
        command_line: &str,
        on_log: LogSink,
        mut cancel: watch::Receiver<bool>,
    ) -> MediaResult<ProcessExit> {
        self.calls.lock().unwrap().push(command_line.to_string());
        let behavior = self.behavior_for(command_line);

        if let Behavior::LaunchError(msg) = &behavior {
            return Err(MediaError::malformed(msg.clone()));
        }
        let args = split_command_line(command_line)?;
        let output = PathBuf::from(args.last().cloned().unwrap_or_default());
        let mut logs = String::new();

        let (success, cancelled) = match behavior {
            Behavior::Succeed(lines) => {
                emit(&lines, &on_log, &mut logs);
                tokio::fs::write(&output, b"encoded").await?;
                (true, false)
            }
            Behavior::Fail(lines) => {
                emit(&lines, &on_log, &mut logs);
                (false, false)
            }
            Behavior::SucceedWithoutOutput => (true, false),
            Behavior::Hang(lines) => {
                emit(&lines, &on_log, &mut logs);
                while !*cancel.borrow_and_update() {
                    if cancel.changed().await.is_err() {
                        break;
                    }
                }
                (false, true)
            }
            Behavior::LaunchError(_) => unreachable!(),
        };

        Ok(ProcessExit {
            success,
            exit_code: if cancelled { None } else { Some(if success { 0 } else { 1 }) },
            logs,
            cancelled,
        })
    }
}

/// Every bus event, in emission order.
pub struct Recorder {
    events: Arc<Mutex<Vec<BusEvent>>>,
    _handle: ListenerHandle,
}

impl Recorder {
    pub fn attach(bus: &StateBus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let handle = bus.listen(move |event| sink.lock().unwrap().push(event.clone()));
        Self {
            events,
            _handle: handle,
        }
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<ProcessingState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BusEvent::State(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<ProgressSample> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BusEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, state: &str) -> usize {
        self.states().iter().filter(|s| s.as_str() == state).count()
    }
}

/// Files left in the scratch directory.
pub fn scratch_files(work_dir: &Path) -> Vec<PathBuf> {
    let dir = work_dir.join(clipfy_media::SCRATCH_DIR_NAME);
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn status_lines(times: &[&str]) -> Vec<String> {
    times
        .iter()
        .map(|t| format!("frame=  42 fps=30 q=28.0 size=  256kB time={} bitrate=1000kbits/s speed=1.2x", t))
        .collect()
}
