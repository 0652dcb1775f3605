use serde::{Deserialize, Serialize};

pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;
pub const DEFAULT_MAX_UNDO_OPERATIONS: usize = 10;
pub const DEFAULT_COLLISION_CAP: usize = 100;

/// How duplicate content is recognized during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateDetection {
    /// Streamed content hash, persisted across runs.
    ExactHash,
    /// Name + size comparison within the current run only.
    SizeOnly,
}

/// What happens to a file no strategy can classify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnclassifiedPolicy {
    /// Leave the file where it is.
    Skip,
    /// Ask the injected resolver, remember the answer.
    Resolve,
    /// Route everything unclassified into one bucket.
    DefaultBucket(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub duplicate_detection: DuplicateDetection,
    pub unclassified_policy: UnclassifiedPolicy,
    /// Emit a progress event every N processed files.
    pub progress_interval: usize,
    /// Operations older than this keep their summary but lose undo eligibility.
    pub max_undo_operations: usize,
    /// Highest " (n)" suffix tried before a move fails outright.
    pub collision_cap: usize,
    /// Source and target are the same directory; only root-level files move.
    pub in_place: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_detection: DuplicateDetection::ExactHash,
            unclassified_policy: UnclassifiedPolicy::Skip,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            max_undo_operations: DEFAULT_MAX_UNDO_OPERATIONS,
            collision_cap: DEFAULT_COLLISION_CAP,
            in_place: false,
        }
    }
}
