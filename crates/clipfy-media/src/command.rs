//! Encoder process backend.
//!
//! Commands arrive as a single line of encoder arguments (everything after the
//! binary name). [`FfmpegProcess`] tokenizes the line, spawns the encoder with
//! piped output, forwards every log line as it arrives and resolves with the
//! exit status plus the full log text. A cancellation signal kills the child.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// Callback receiving each encoder log line as it arrives.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// How long to keep reading buffered output after the process has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
const CANCEL_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Terminal result of one encoder process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    /// Process returned a success code and was not cancelled
    pub success: bool,
    /// Raw exit code, `None` when killed by a signal
    pub exit_code: Option<i32>,
    /// Every line the process wrote, in arrival order
    pub logs: String,
    /// Process was terminated by a cancellation request
    pub cancelled: bool,
}

/// Something that can run one encoder command line to completion.
#[async_trait]
pub trait EncoderBackend: Send + Sync {
    /// Run `command_line`, streaming lines to `on_log`.
    ///
    /// Returns `Err` only when the process could not be launched. Setting the
    /// `cancel` flag terminates a running process; the call then resolves
    /// with the logs collected so far.
    async fn execute(
        &self,
        command_line: &str,
        on_log: LogSink,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<ProcessExit>;
}

/// Split a command line into arguments.
///
/// Whitespace separates arguments. Single quotes preserve their content
/// verbatim; double quotes allow `\"` and `\\` escapes. Outside quotes a
/// backslash escapes the next character.
pub fn split_command_line(line: &str) -> MediaResult<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(MediaError::malformed("unterminated single quote")),
                    }
                }
            }
            '"' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => {
                                return Err(MediaError::malformed("unterminated double quote"))
                            }
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(MediaError::malformed("unterminated double quote")),
                    }
                }
            }
            '\\' => {
                in_arg = true;
                match chars.next() {
                    Some(ch) => current.push(ch),
                    None => return Err(MediaError::malformed("trailing backslash")),
                }
            }
            c if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            c => {
                in_arg = true;
                current.push(c);
            }
        }
    }

    if in_arg {
        args.push(current);
    }
    if args.is_empty() {
        return Err(MediaError::malformed("empty command"));
    }
    Ok(args)
}

/// Encoder backend that runs a real executable.
#[derive(Debug, Clone)]
pub struct FfmpegProcess {
    program: String,
}

impl Default for FfmpegProcess {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegProcess {
    /// Create a backend for the given executable name or path.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Resolve the executable in PATH.
    pub fn check(&self) -> MediaResult<std::path::PathBuf> {
        which::which(&self.program).map_err(|_| MediaError::EncoderNotFound(self.program.clone()))
    }
}

#[async_trait]
impl EncoderBackend for FfmpegProcess {
    async fn execute(
        &self,
        command_line: &str,
        on_log: LogSink,
        mut cancel: watch::Receiver<bool>,
    ) -> MediaResult<ProcessExit> {
        let binary = self.check()?;
        let args = split_command_line(command_line)?;

        if *cancel.borrow_and_update() {
            return Err(MediaError::Cancelled);
        }

        debug!("Running encoder: {} {}", self.program, command_line);

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::spawn_failed(&self.program, e))?;

        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, line_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, line_tx.clone());
        }
        drop(line_tx);

        let mut logs = String::new();
        let mut cancelled = false;
        let mut watching_cancel = true;

        let status = loop {
            tokio::select! {
                changed = cancel.changed(), if watching_cancel => {
                    match changed {
                        Ok(()) if *cancel.borrow_and_update() => {
                            info!(program = %self.program, "Encoder cancelled, killing process");
                            cancelled = true;
                            watching_cancel = false;
                            if let Err(e) = child.start_kill() {
                                warn!("Failed to kill encoder process: {}", e);
                            }
                        }
                        Ok(()) => {}
                        Err(_) => watching_cancel = false,
                    }
                }
                Some(line) = line_rx.recv() => {
                    on_log(&line);
                    push_line(&mut logs, &line);
                }
                status = child.wait() => break status?,
            }
        };

        // Output still buffered in the pipes belongs to this run.
        let drain_timeout = if cancelled {
            CANCEL_DRAIN_TIMEOUT
        } else {
            DRAIN_TIMEOUT
        };
        let drained = tokio::time::timeout(drain_timeout, async {
            while let Some(line) = line_rx.recv().await {
                on_log(&line);
                push_line(&mut logs, &line);
            }
        })
        .await;
        if drained.is_err() {
            debug!("Encoder output still open after exit, dropping remaining lines");
        }

        Ok(ProcessExit {
            success: status.success() && !cancelled,
            exit_code: status.code(),
            logs,
            cancelled,
        })
    }
}

/// Forward output as lines. Status updates end with `\r` rather than `\n`,
/// so both terminate a line; empty segments are skipped.
fn spawn_line_reader<R>(mut reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        let mut pending = Vec::new();
        loop {
            let read = match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            pending.extend_from_slice(&chunk[..read]);
            if !send_complete_lines(&mut pending, &tx) {
                return;
            }
        }
        if !pending.is_empty() {
            let _ = tx.send(String::from_utf8_lossy(&pending).into_owned());
        }
    });
}

/// Send every terminated line in `pending`, keeping the unterminated tail.
/// Returns `false` once the receiver is gone.
fn send_complete_lines(pending: &mut Vec<u8>, tx: &mpsc::UnboundedSender<String>) -> bool {
    let Some(last_break) = pending.iter().rposition(|b| matches!(b, b'\r' | b'\n')) else {
        return true;
    };
    let tail = pending.split_off(last_break + 1);
    for line in split_lines(pending) {
        if tx.send(line).is_err() {
            return false;
        }
    }
    *pending = tail;
    true
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|b| matches!(b, b'\r' | b'\n'))
        .filter(|segment| !segment.is_empty())
        .map(|segment| String::from_utf8_lossy(segment).into_owned())
        .collect()
}

fn push_line(logs: &mut String, line: &str) {
    logs.push_str(line);
    logs.push('\n');
}

/// Check if the encoder binary is available.
pub fn check_encoder(program: &str) -> MediaResult<std::path::PathBuf> {
    FfmpegProcess::new(program).check()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio_test::assert_ok;

    fn collecting_sink() -> (LogSink, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: LogSink = Arc::new(move |line: &str| {
            sink_seen.lock().unwrap().push(line.to_string());
        });
        (sink, seen)
    }

    #[test]
    fn test_split_plain_arguments() {
        let args = split_command_line("-i input.mp4  -c:v libx264 -crf 23").unwrap();
        assert_eq!(args, vec!["-i", "input.mp4", "-c:v", "libx264", "-crf", "23"]);
    }

    #[test]
    fn test_split_quoted_arguments() {
        let args = split_command_line(r#"-i "/sd card/My Clip.mp4" -vf 'scale=1280:-2' -y "out \"1\".mp4""#)
            .unwrap();
        assert_eq!(
            args,
            vec!["-i", "/sd card/My Clip.mp4", "-vf", "scale=1280:-2", "-y", "out \"1\".mp4"]
        );
    }

    #[test]
    fn test_split_empty_quotes_keep_argument() {
        let args = split_command_line(r#"-metadata title="" -y out.mp4"#).unwrap();
        assert_eq!(args, vec!["-metadata", "title=", "-y", "out.mp4"]);
    }

    #[test]
    fn test_split_rejects_malformed_lines() {
        assert!(matches!(
            split_command_line(r#"-i "unterminated.mp4"#),
            Err(MediaError::MalformedCommand(_))
        ));
        assert!(matches!(
            split_command_line("-i 'open"),
            Err(MediaError::MalformedCommand(_))
        ));
        assert!(matches!(split_command_line("   "), Err(MediaError::MalformedCommand(_))));
    }

    #[test]
    fn test_carriage_returns_terminate_lines() {
        assert_eq!(
            split_lines(b"frame=1 time=00:00:01.00\rframe=2 time=00:00:02.00\r\nDone\n"),
            vec!["frame=1 time=00:00:01.00", "frame=2 time=00:00:02.00", "Done"]
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pending = b"frame=1\rframe=2 ti".to_vec();
        assert!(send_complete_lines(&mut pending, &tx));
        assert_eq!(rx.try_recv().unwrap(), "frame=1");
        assert!(rx.try_recv().is_err());
        assert_eq!(pending, b"frame=2 ti");
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let backend = FfmpegProcess::new("clipfy-no-such-encoder-binary");
        let (sink, _) = collecting_sink();
        let (_tx, rx) = watch::channel(false);

        let err = backend.execute("-version", sink, rx).await.unwrap_err();
        assert!(matches!(err, MediaError::EncoderNotFound(_)));
        assert!(err.is_launch_error());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_streams_lines_and_reports_success() {
        let backend = FfmpegProcess::new("sh");
        let (sink, seen) = collecting_sink();
        let (_tx, rx) = watch::channel(false);

        let exit = assert_ok!(
            backend
                .execute("-c 'echo first; echo time=00:00:01.00 >&2; echo last'", sink, rx)
                .await
        );

        assert!(exit.success);
        assert!(!exit.cancelled);
        assert_eq!(exit.exit_code, Some(0));
        assert!(exit.logs.contains("first"));
        assert!(exit.logs.contains("time=00:00:01.00"));
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_status_updates_stream_before_exit() {
        let backend = FfmpegProcess::new("sh");
        let seen: Arc<Mutex<Vec<(String, std::time::Instant)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: LogSink = Arc::new(move |line: &str| {
            sink_seen
                .lock()
                .unwrap()
                .push((line.to_string(), std::time::Instant::now()));
        });
        let (_tx, rx) = watch::channel(false);

        let exit = assert_ok!(
            backend
                .execute(
                    "-c 'printf \"frame=1 time=00:00:01.00 speed=1x\\r\" >&2; sleep 1; \
                     printf \"frame=2 time=00:00:05.00 speed=1x\\r\" >&2; sleep 1; \
                     printf \"frame=3 time=00:00:09.00 speed=1x\\n\" >&2'",
                    sink,
                    rx,
                )
                .await
        );
        let exited = std::time::Instant::now();
        assert!(exit.success);

        let seen = seen.lock().unwrap();
        let progress: Vec<f32> = seen
            .iter()
            .filter_map(|(line, _)| crate::progress::parse_progress(line, 10_000))
            .collect();
        assert_eq!(progress, vec![10.0, 50.0, 90.0]);
        // The first update arrived while the process was still sleeping.
        assert!(exited.duration_since(seen[0].1) >= Duration::from_millis(1500));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_failure_with_logs() {
        let backend = FfmpegProcess::new("sh");
        let (sink, _) = collecting_sink();
        let (_tx, rx) = watch::channel(false);

        let exit = backend
            .execute("-c 'echo broken input >&2; exit 3'", sink, rx)
            .await
            .unwrap();

        assert!(!exit.success);
        assert_eq!(exit.exit_code, Some(3));
        assert!(exit.logs.contains("broken input"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_running_process() {
        let backend = FfmpegProcess::new("sh");
        let (sink, _) = collecting_sink();
        let (tx, rx) = watch::channel(false);

        let run = tokio::spawn(async move {
            backend
                .execute("-c 'echo started; exec sleep 30'", sink, rx)
                .await
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send_replace(true);

        let exit = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("cancelled process should resolve")
            .unwrap()
            .unwrap();

        assert!(exit.cancelled);
        assert!(!exit.success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_before_launch_does_not_spawn() {
        let backend = FfmpegProcess::new("sh");
        let (sink, seen) = collecting_sink();
        let (_tx, rx) = watch::channel(true);

        let err = backend.execute("-c 'echo hi'", sink, rx).await.unwrap_err();
        assert!(matches!(err, MediaError::Cancelled));
        assert!(seen.lock().unwrap().is_empty());
    }
}
