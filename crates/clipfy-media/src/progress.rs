//! Encoder progress parsing.
//!
//! The encoder reports elapsed output time on its status lines as
//! `time=HH:MM:SS.frac`. Parsing is stateless: a line without a marker yields
//! `None` so the caller keeps its previous value instead of dropping to zero.

use regex::Regex;
use std::sync::OnceLock;

static TIME_MARKER: OnceLock<Regex> = OnceLock::new();

fn time_marker() -> &'static Regex {
    TIME_MARKER.get_or_init(|| {
        Regex::new(r"time=(\d+):(\d+):(\d+\.\d+)").expect("time marker pattern is valid")
    })
}

/// Extract the elapsed output time in milliseconds from one log line.
///
/// When several status updates share a line the latest marker wins.
pub fn parse_elapsed_ms(line: &str) -> Option<f64> {
    let caps = time_marker().captures_iter(line).last()?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    Some((hours * 3600.0 + minutes * 60.0 + seconds) * 1000.0)
}

/// Percent complete for a time-based item.
///
/// Returns `None` when the line carries no time marker, `Some(0.0)` when the
/// expected duration is unknown, otherwise the clamped percentage.
pub fn parse_progress(line: &str, expected_duration_ms: u64) -> Option<f32> {
    let elapsed_ms = parse_elapsed_ms(line)?;
    if expected_duration_ms == 0 {
        return Some(0.0);
    }
    let percent = elapsed_ms / expected_duration_ms as f64 * 100.0;
    Some(percent.clamp(0.0, 100.0) as f32)
}

/// Coarse progress for index-based batches: `done / total * 100`.
pub fn image_progress(done: usize, total: usize) -> f32 {
    if total == 0 {
        return 100.0;
    }
    (done.min(total) as f32 / total as f32) * 100.0
}
