use std::path::PathBuf;

use serde::Serialize;

/// A candidate file surfaced during the scan. The content hash is computed
/// lazily by the duplicate detector, never here.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    /// Modification time in unix seconds; `None` when the filesystem
    /// cannot say.
    pub modified: Option<i64>,
}

/// Verdict of one classification strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub folder: String,
    pub strategy: &'static str,
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn is_high_confidence(&self) -> bool {
        self.confidence >= crate::services::classifier::HIGH_CONFIDENCE_THRESHOLD
    }
}

/// Per-file failure carried into the final summary.
#[derive(Debug, Clone, Serialize)]
pub struct FileError {
    pub file_name: String,
    pub reason: String,
}
