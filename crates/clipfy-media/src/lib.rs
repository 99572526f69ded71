//! Encoder integration for Clipfy.
//!
//! This crate provides:
//! - An encoder backend that runs the external binary with streamed logs
//! - Progress parsing from encoder status lines
//! - Cancellable single-invocation encoder sessions
//! - Scratch file allocation and reclamation

pub mod command;
pub mod error;
pub mod progress;
pub mod session;
pub mod temp_files;

pub use command::{
    check_encoder, split_command_line, EncoderBackend, FfmpegProcess, LogSink, ProcessExit,
};
pub use error::{MediaError, MediaResult};
pub use progress::{image_progress, parse_elapsed_ms, parse_progress};
pub use session::{EncodeOutcome, EncoderSession, SessionState};
pub use temp_files::{TempFileManager, SCRATCH_DIR_NAME};
