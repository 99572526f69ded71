//! Result handed back to the dispatcher.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use clipfy_models::{BatchId, BatchKind};

/// How the item loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every item ran (or was skipped for lack of a command)
    Completed,
    /// Stopped on request; `next_index` is the first item that did not finish
    Cancelled { next_index: usize },
    /// Primary and fallback commands failed for `index`
    EncodeFailed { index: usize },
    /// The artifact store rejected the output of `index`
    SaveFailed { index: usize },
}

impl BatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOutcome::Completed => "completed",
            BatchOutcome::Cancelled { .. } => "cancelled",
            BatchOutcome::EncodeFailed { .. } => "encode_failed",
            BatchOutcome::SaveFailed { .. } => "save_failed",
        }
    }
}

/// Overall batch result: success flag plus every permanent path, in item order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: BatchId,
    pub kind: BatchKind,
    pub success: bool,
    pub paths: Vec<PathBuf>,
    pub outcome: BatchOutcome,
}

impl BatchReport {
    pub fn new(batch_id: BatchId, kind: BatchKind, paths: Vec<PathBuf>, outcome: BatchOutcome) -> Self {
        Self {
            batch_id,
            kind,
            success: outcome == BatchOutcome::Completed,
            paths,
            outcome,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_completed_is_success() {
        let id = BatchId::from_string("b1");
        let done = BatchReport::new(id.clone(), BatchKind::Video, vec![], BatchOutcome::Completed);
        assert!(done.success);

        let cancelled = BatchReport::new(
            id,
            BatchKind::Video,
            vec![PathBuf::from("/out/a.mp4")],
            BatchOutcome::Cancelled { next_index: 1 },
        );
        assert!(!cancelled.success);
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.paths.len(), 1);
    }

    #[test]
    fn test_report_json_shape() {
        let report = BatchReport::new(
            BatchId::from_string("b2"),
            BatchKind::Image,
            vec![],
            BatchOutcome::SaveFailed { index: 3 },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["batch_id"], "b2");
        assert_eq!(json["kind"], "image");
        assert_eq!(json["success"], false);
        assert_eq!(json["outcome"]["status"], "save_failed");
        assert_eq!(json["outcome"]["index"], 3);
    }
}
