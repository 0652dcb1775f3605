use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::{EngineConfig, UnclassifiedPolicy};
use crate::context::{CancelToken, FlightGuard, SingleFlight};
use crate::data::store::{LogStore, SqliteStore};
use crate::error::EngineError;
use crate::models::operation::{OperationRecord, OperationStats, OperationStatus, OperationType};
use crate::models::plan::{FileError, FileRecord};
use crate::services::classifier::{
    Classifier, Resolver, HIGH_CONFIDENCE_THRESHOLD, MEDIUM_CONFIDENCE_THRESHOLD,
};
use crate::services::collector::{no_skip, FileCollector, SkipPredicate};
use crate::services::dupes::DuplicateDetector;
use crate::services::learned;
use crate::services::mover::{MoveExecutor, MoveOutcome};
use crate::services::oplog::{OperationLog, UndoReport};
use crate::services::path_validator;
use crate::services::sanitize::sanitize;

const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Progress event pushed to the interactive side. `total` stays `None`
/// because the organize path streams and never counts ahead.
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub processed: usize,
    pub total: Option<usize>,
    pub current: String,
}

#[derive(Debug, Clone)]
pub struct OrganizeRequest {
    pub sources: Vec<PathBuf>,
    pub target: PathBuf,
    /// Caller has already previewed and confirmed medium-confidence
    /// placements; without it they are left untouched and counted.
    pub medium_confirmed: bool,
}

impl OrganizeRequest {
    pub fn new(sources: Vec<PathBuf>, target: PathBuf) -> Self {
        Self {
            sources,
            target,
            medium_confirmed: false,
        }
    }
}

/// Final artifact of one organize run. A batch with failures is never
/// reported as fully successful: `failed` and `errors` travel with it.
#[derive(Debug, Serialize)]
pub struct OrganizeSummary {
    pub operation_id: String,
    pub status: OperationStatus,
    pub moved: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub unclassified: usize,
    pub needs_review: usize,
    pub errors: Vec<FileError>,
}

/// Handle to a background run: progress stream, cancellation, and the
/// awaited summary.
pub struct OrganizeHandle {
    pub progress: mpsc::Receiver<Progress>,
    pub cancel: CancelToken,
    task: tokio::task::JoinHandle<Result<OrganizeSummary, EngineError>>,
}

impl OrganizeHandle {
    pub async fn wait(self) -> Result<OrganizeSummary, EngineError> {
        self.task
            .await
            .map_err(|e| EngineError::General(format!("organize worker panicked: {e}")))?
    }
}

pub struct UndoHandle {
    pub progress: mpsc::Receiver<Progress>,
    task: tokio::task::JoinHandle<Result<UndoReport, EngineError>>,
}

impl UndoHandle {
    pub async fn wait(self) -> Result<UndoReport, EngineError> {
        self.task
            .await
            .map_err(|e| EngineError::General(format!("undo worker panicked: {e}")))?
    }
}

/// Drives the full pipeline (collect -> classify -> duplicates -> move ->
/// log) on a background execution context. One engine instance owns one
/// store database; independent instances are fully isolated, which is what
/// makes them testable side by side.
pub struct Engine {
    config: EngineConfig,
    db_path: PathBuf,
    classifier: Arc<Classifier>,
    resolver: Option<Arc<dyn Resolver>>,
    skip: SkipPredicate,
    gate: SingleFlight,
}

impl Engine {
    pub fn new(db_path: impl Into<PathBuf>, config: EngineConfig) -> Self {
        Self {
            config,
            db_path: db_path.into(),
            classifier: Arc::new(Classifier::with_default_strategies()),
            resolver: None,
            skip: no_skip(),
            gate: SingleFlight::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_skip_predicate(mut self, skip: SkipPredicate) -> Self {
        self.skip = skip;
        self
    }

    /// History is readable from the interactive context at any time; only
    /// the background worker writes.
    pub fn recent_operations(&self, limit: usize) -> Result<Vec<OperationRecord>, EngineError> {
        let store = SqliteStore::open(&self.db_path)?;
        store.recent_operations(limit)
    }

    /// Validates, then launches the run on a background worker. Validation
    /// failures and an unopenable store abort here, before any file is
    /// touched.
    pub fn organize(&self, request: OrganizeRequest) -> Result<OrganizeHandle, EngineError> {
        let guard = self.gate.try_acquire("organize")?;

        let (sources, target) =
            path_validator::validate_operation(&request.sources, &request.target, self.config.in_place)?;
        let store = SqliteStore::open(&self.db_path)
            .map_err(|e| EngineError::General(format!("operation log store unwritable: {e}")))?;

        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let cancel = CancelToken::new();

        let worker = PipelineWorker {
            config: self.config.clone(),
            classifier: self.classifier.clone(),
            resolver: self.resolver.clone(),
            skip: self.skip.clone(),
            store,
            sources,
            target,
            medium_confirmed: request.medium_confirmed,
            cancel: cancel.clone(),
            progress: tx,
        };

        let task = tokio::task::spawn_blocking(move || {
            let _guard: FlightGuard = guard;
            worker.run()
        });

        Ok(OrganizeHandle {
            progress: rx,
            cancel,
            task,
        })
    }

    /// Undo runs as its own background unit, mutually exclusive with an
    /// active organize through the same single-flight gate.
    pub fn undo(&self, operation_id: &str) -> Result<UndoHandle, EngineError> {
        let guard = self.gate.try_acquire("undo")?;
        let store = SqliteStore::open(&self.db_path)
            .map_err(|e| EngineError::General(format!("operation log store unwritable: {e}")))?;

        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let operation_id = operation_id.to_string();

        let task = tokio::task::spawn_blocking(move || {
            let _guard: FlightGuard = guard;
            let log = OperationLog::new(&store);
            log.undo(&operation_id, |processed, total, current| {
                let _ = tx.try_send(Progress {
                    processed,
                    total: Some(total),
                    current: current.to_string(),
                });
            })
        });

        Ok(UndoHandle { progress: rx, task })
    }
}

/// Everything the background run owns. The worker is the only writer to
/// the store for the duration of the run.
struct PipelineWorker {
    config: EngineConfig,
    classifier: Arc<Classifier>,
    resolver: Option<Arc<dyn Resolver>>,
    skip: SkipPredicate,
    store: SqliteStore,
    sources: Vec<PathBuf>,
    target: PathBuf,
    medium_confirmed: bool,
    cancel: CancelToken,
    progress: mpsc::Sender<Progress>,
}

impl PipelineWorker {
    fn run(self) -> Result<OrganizeSummary, EngineError> {
        let log = OperationLog::new(&self.store);
        let source_strings: Vec<String> = self
            .sources
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        let operation_id = log.start_operation(
            OperationType::Organize,
            &source_strings,
            &self.target.to_string_lossy(),
        )?;

        let collector = FileCollector::new(self.skip.clone(), self.config.in_place);
        let mut detector =
            DuplicateDetector::new(&self.store, self.config.duplicate_detection);
        let executor = MoveExecutor::new(self.config.collision_cap);

        let mut summary = OrganizeSummary {
            operation_id: operation_id.clone(),
            status: OperationStatus::Running,
            moved: 0,
            failed: 0,
            duplicates: 0,
            unclassified: 0,
            needs_review: 0,
            errors: Vec::new(),
        };
        let mut processed = 0usize;
        let mut cancelled = false;

        for record in collector.stream(self.sources.clone()) {
            // Checked between files: the in-flight move always finishes.
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            processed += 1;
            // The first file is reported immediately so short runs are not
            // silent until the final event.
            if processed == 1 || processed % self.config.progress_interval.max(1) == 0 {
                // Non-blocking: a saturated channel drops the event rather
                // than stalling the worker.
                let _ = self.progress.try_send(Progress {
                    processed,
                    total: None,
                    current: record.file_name.clone(),
                });
            }

            let status = detector.check(&record);
            if let Some(quarantine) = status.quarantine_folder() {
                summary.duplicates += 1;
                let dest = self.target.join(quarantine);
                self.execute_move(&log, &operation_id, &executor, &record, &dest, &mut summary);
                continue;
            }

            let Some(dest_folder) = self.destination_for(&record) else {
                summary.unclassified += 1;
                continue;
            };
            if dest_folder == DestinationVerdict::NeedsReview {
                summary.needs_review += 1;
                continue;
            }
            let DestinationVerdict::Folder(folder) = dest_folder else {
                continue;
            };

            let dest = self.target.join(folder);
            // In-place runs can plan a file onto itself; nothing to do.
            if dest.join(&record.file_name) == record.path {
                continue;
            }
            self.execute_move(&log, &operation_id, &executor, &record, &dest, &mut summary);
        }

        summary.status = if cancelled {
            OperationStatus::Cancelled
        } else {
            OperationStatus::Completed
        };

        let stats = OperationStats {
            moved: summary.moved,
            failed: summary.failed,
            duplicates: summary.duplicates,
        };
        log.end_operation(
            &operation_id,
            summary.status,
            &stats,
            self.config.max_undo_operations,
        )?;

        let _ = self.progress.try_send(Progress {
            processed,
            total: Some(processed),
            current: String::new(),
        });
        Ok(summary)
    }

    fn destination_for(&self, record: &FileRecord) -> Option<DestinationVerdict> {
        if let Some(result) = self.classifier.classify(&record.file_name, &self.store) {
            if result.confidence >= HIGH_CONFIDENCE_THRESHOLD
                || (result.confidence >= MEDIUM_CONFIDENCE_THRESHOLD && self.medium_confirmed)
            {
                return Some(DestinationVerdict::Folder(result.folder));
            }
            if result.confidence >= MEDIUM_CONFIDENCE_THRESHOLD {
                return Some(DestinationVerdict::NeedsReview);
            }
        }

        match &self.config.unclassified_policy {
            UnclassifiedPolicy::Skip => None,
            UnclassifiedPolicy::DefaultBucket(bucket) => {
                Some(DestinationVerdict::Folder(sanitize(bucket)))
            }
            UnclassifiedPolicy::Resolve => {
                let resolver = self.resolver.as_ref()?;
                let folder = sanitize(&resolver.resolve(&record.file_name)?);
                // The answer is remembered for every future file of this
                // shape.
                if let Err(e) = learned::learn(&self.store, &record.file_name, &folder) {
                    tracing::warn!("could not persist learned pattern: {e}");
                }
                Some(DestinationVerdict::Folder(folder))
            }
        }
    }

    fn execute_move(
        &self,
        log: &OperationLog<'_>,
        operation_id: &str,
        executor: &MoveExecutor,
        record: &FileRecord,
        dest_folder: &Path,
        summary: &mut OrganizeSummary,
    ) {
        match executor.move_file(&record.path, dest_folder, &record.file_name) {
            MoveOutcome::Moved(final_path) => {
                tracing::debug!(
                    "moved {} -> {}",
                    record.path.display(),
                    final_path.display()
                );
                if let Err(e) = log.record_move(operation_id, &record.path, &final_path, record.size)
                {
                    // The move happened; losing its log entry costs undo
                    // coverage for this one file, not the batch.
                    tracing::warn!("failed to log move of {}: {e}", record.file_name);
                }
                summary.moved += 1;
            }
            MoveOutcome::Failed(reason) => {
                tracing::warn!("move failed for {}: {reason}", record.file_name);
                summary.failed += 1;
                summary.errors.push(FileError {
                    file_name: record.file_name.clone(),
                    reason,
                });
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum DestinationVerdict {
    Folder(String),
    NeedsReview,
}
