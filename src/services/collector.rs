use std::path::PathBuf;
use std::sync::Arc;

use walkdir::WalkDir;

use crate::models::plan::FileRecord;
use crate::services::dupes::{EXACT_DUPES_FOLDER, NAME_COLLISION_FOLDER};

/// Directory-name predicate supplied by the caller; `true` prunes the
/// directory in place so its descendants are never visited.
pub type SkipPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

pub fn no_skip() -> SkipPredicate {
    Arc::new(|_| false)
}

/// Lazily streams candidate files out of a root set. One instance covers one
/// invocation; the organize path must never materialize the full list.
pub struct FileCollector {
    skip: SkipPredicate,
    in_place: bool,
}

/// Analysis-only totals; produced by [`FileCollector::snapshot`].
#[derive(Debug, Default)]
pub struct ScanSummary {
    pub files: usize,
    pub total_bytes: u64,
}

impl FileCollector {
    pub fn new(skip: SkipPredicate, in_place: bool) -> Self {
        Self { skip, in_place }
    }

    fn keep_entry(&self, entry: &walkdir::DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        // Quarantine output is never re-collected, regardless of predicate.
        if name == EXACT_DUPES_FOLDER || name == NAME_COLLISION_FOLDER {
            return false;
        }
        !(self.skip)(&name)
    }

    /// Lazy stream over all roots. Unreadable subdirectories are logged and
    /// skipped; traversal continues into their siblings.
    pub fn stream(&self, roots: Vec<PathBuf>) -> impl Iterator<Item = FileRecord> + '_ {
        // In-place runs only touch root-level files, which keeps repeated
        // runs from nesting category folders inside category folders.
        let max_depth = if self.in_place { 1 } else { usize::MAX };

        roots.into_iter().flat_map(move |root| {
            WalkDir::new(root)
                .max_depth(max_depth)
                .into_iter()
                .filter_entry(|entry| self.keep_entry(entry))
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!("skipping unreadable entry: {e}");
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .filter_map(|entry| {
                    let file_name = entry.file_name().to_string_lossy().to_string();
                    let meta = match entry.metadata() {
                        Ok(meta) => meta,
                        Err(e) => {
                            tracing::warn!("cannot stat {}: {e}", entry.path().display());
                            return None;
                        }
                    };
                    let modified = meta
                        .modified()
                        .ok()
                        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                        .map(|d| d.as_secs() as i64);
                    Some(FileRecord {
                        path: entry.into_path(),
                        file_name,
                        size: meta.len(),
                        modified,
                    })
                })
        })
    }

    /// Materialized listing for statistics. Explicitly not part of the move
    /// pipeline.
    pub fn snapshot(&self, roots: Vec<PathBuf>) -> (Vec<FileRecord>, ScanSummary) {
        let records: Vec<FileRecord> = self.stream(roots).collect();
        let summary = ScanSummary {
            files: records.len(),
            total_bytes: records.iter().map(|r| r.size).sum(),
        };
        (records, summary)
    }
}
