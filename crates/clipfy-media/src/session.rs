//! Single encoder invocation with cancellation.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::command::{EncoderBackend, LogSink};
use crate::error::MediaError;

/// Lifecycle of one [`EncoderSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Succeeded | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// Result of a session: success flag plus the full diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOutcome {
    pub success: bool,
    pub logs: String,
}

impl EncodeOutcome {
    fn failed(logs: impl Into<String>) -> Self {
        Self {
            success: false,
            logs: logs.into(),
        }
    }
}

/// Wraps exactly one external encoder invocation.
///
/// `Idle -> Running -> {Succeeded | Failed | Cancelled}`. Launch errors never
/// escape: they resolve as a failed outcome carrying the diagnostic message.
pub struct EncoderSession {
    backend: Arc<dyn EncoderBackend>,
    state: watch::Sender<SessionState>,
    cancel: watch::Sender<bool>,
}

impl EncoderSession {
    pub fn new(backend: Arc<dyn EncoderBackend>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let (cancel, _) = watch::channel(false);
        Self {
            backend,
            state,
            cancel,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Run `command_line` to completion, streaming every log line to `on_log`.
    pub async fn start(&self, command_line: &str, on_log: LogSink) -> EncodeOutcome {
        let started = self.state.send_if_modified(|state| {
            if *state == SessionState::Idle {
                *state = SessionState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            return EncodeOutcome::failed("encoder session already used");
        }

        if *self.cancel.borrow() {
            self.finish(SessionState::Cancelled);
            return EncodeOutcome::failed("");
        }

        let result = self
            .backend
            .execute(command_line, on_log, self.cancel.subscribe())
            .await;

        match result {
            Ok(exit) => {
                let state = if exit.cancelled {
                    SessionState::Cancelled
                } else if exit.success {
                    SessionState::Succeeded
                } else {
                    SessionState::Failed
                };
                debug!(?state, exit_code = ?exit.exit_code, "Encoder session finished");
                self.finish(state);
                EncodeOutcome {
                    success: exit.success,
                    logs: exit.logs,
                }
            }
            Err(MediaError::Cancelled) => {
                self.finish(SessionState::Cancelled);
                EncodeOutcome::failed("")
            }
            Err(e) => {
                warn!("Encoder could not be launched: {}", e);
                self.finish(SessionState::Failed);
                EncodeOutcome::failed(e.to_string())
            }
        }
    }

    /// Request termination of the in-flight process.
    ///
    /// Safe to call any number of times; a no-op once the session finished.
    pub fn cancel(&self) {
        if self.state().is_terminal() {
            return;
        }
        self.cancel.send_replace(true);
    }

    pub fn is_cancel_requested(&self) -> bool {
        *self.cancel.borrow()
    }

    fn finish(&self, terminal: SessionState) {
        self.state.send_replace(terminal);
    }
}

impl std::fmt::Debug for EncoderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderSession")
            .field("state", &self.state())
            .field("cancel_requested", &self.is_cancel_requested())
            .finish()
    }
}
