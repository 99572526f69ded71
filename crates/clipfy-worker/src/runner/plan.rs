//! Command selection for one item.

use std::path::Path;

use clipfy_models::{BatchKind, JobItem};

/// Ordered command variants to try for `item`: the primary command, then the
/// fallback (video items only, when non-empty). Empty when the item has no
/// primary command.
pub fn command_variants(item: &JobItem, kind: BatchKind) -> Vec<&str> {
    let Some(primary) = item
        .command
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    else {
        return Vec::new();
    };

    let mut variants = vec![primary];
    if kind == BatchKind::Video {
        if let Some(fallback) = item.fallback() {
            variants.push(fallback);
        }
    }
    variants
}

/// Append the overwrite flag and quoted output path to `command`.
pub fn with_output(command: &str, output: &Path) -> String {
    let quoted = output
        .to_string_lossy()
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!("{} -y \"{}\"", command.trim_end(), quoted)
}
