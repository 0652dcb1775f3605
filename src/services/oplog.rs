use std::fs;
use std::path::Path;

use crate::data::store::LogStore;
use crate::error::EngineError;
use crate::models::operation::{
    MoveRecord, OperationRecord, OperationStats, OperationStatus, OperationType,
};
use crate::models::plan::FileError;

/// Result of replaying one operation backwards.
#[derive(Debug, Default)]
pub struct UndoReport {
    pub restored: usize,
    pub failed: usize,
    pub errors: Vec<FileError>,
    pub summary: String,
}

/// Append-only record of operations and their moves, plus undo. All writes
/// go through the background worker that owns the store; readers of history
/// use the store's list methods directly.
pub struct OperationLog<'a> {
    store: &'a dyn LogStore,
}

impl<'a> OperationLog<'a> {
    pub fn new(store: &'a dyn LogStore) -> Self {
        Self { store }
    }

    pub fn start_operation(
        &self,
        operation_type: OperationType,
        sources: &[String],
        target: &str,
    ) -> Result<String, EngineError> {
        let operation_id = uuid::Uuid::new_v4().to_string();
        let record = OperationRecord {
            operation_id: operation_id.clone(),
            operation_type,
            status: OperationStatus::Running,
            source_dirs: sources.to_vec(),
            target_dir: target.to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            finished_at: None,
            stats: OperationStats::default(),
        };
        self.store.begin_operation(&record)?;
        tracing::info!("operation {operation_id} started ({operation_type})");
        Ok(operation_id)
    }

    /// One durable append per executed move.
    pub fn record_move(
        &self,
        operation_id: &str,
        source: &Path,
        dest: &Path,
        size: u64,
    ) -> Result<(), EngineError> {
        self.store.append_move(
            operation_id,
            &MoveRecord {
                source: source.to_path_buf(),
                dest: dest.to_path_buf(),
                size,
                recorded_at: chrono::Utc::now().to_rfc3339(),
            },
        )
    }

    /// Closes the operation and drops undo eligibility for anything beyond
    /// the retention window.
    pub fn end_operation(
        &self,
        operation_id: &str,
        status: OperationStatus,
        stats: &OperationStats,
        max_undo_operations: usize,
    ) -> Result<(), EngineError> {
        self.store.finish_operation(operation_id, status, stats)?;
        let pruned = self.store.compact(max_undo_operations)?;
        if pruned > 0 {
            tracing::debug!("compacted {pruned} move records past the undo window");
        }
        tracing::info!("operation {operation_id} finished: {status}");
        Ok(())
    }

    /// Replays an operation's moves in strict reverse order. A record whose
    /// destination vanished or whose original path is occupied is counted
    /// and skipped; the rest still run. Undoing an already-undone operation
    /// reports zero remaining moves.
    pub fn undo(
        &self,
        operation_id: &str,
        mut progress: impl FnMut(usize, usize, &str),
    ) -> Result<UndoReport, EngineError> {
        let operation = self
            .store
            .get_operation(operation_id)?
            .ok_or_else(|| EngineError::General(format!("unknown operation: {operation_id}")))?;

        if operation.operation_type == OperationType::Undo {
            return Err(EngineError::Validation(format!(
                "operation {operation_id} is an undo run and cannot itself be undone"
            )));
        }
        if operation.status == OperationStatus::UndoCompleted {
            return Ok(UndoReport {
                summary: "operation already undone; 0 moves remaining".to_string(),
                ..UndoReport::default()
            });
        }
        if !operation.status.is_undoable() {
            return Err(EngineError::Validation(format!(
                "operation {operation_id} cannot be undone from status {}",
                operation.status
            )));
        }

        self.store
            .set_status(operation_id, OperationStatus::UndoRequested)?;

        let moves = self.store.moves_for(operation_id)?;
        let total = moves.len();
        let mut report = UndoReport::default();

        for (index, record) in moves.iter().rev().enumerate() {
            let file_name = record
                .dest
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            progress(index + 1, total, &file_name);

            match restore(record) {
                Ok(()) => report.restored += 1,
                Err(reason) => {
                    report.failed += 1;
                    report.errors.push(FileError { file_name, reason });
                }
            }
        }

        self.store
            .set_status(operation_id, OperationStatus::UndoCompleted)?;

        // The undo run gets its own history row. It moves files from the
        // organize target back toward the original sources.
        let undo_id = self.start_operation(
            OperationType::Undo,
            &[operation.target_dir.clone()],
            &operation.source_dirs.join(", "),
        )?;
        self.store.finish_operation(
            &undo_id,
            OperationStatus::Completed,
            &OperationStats {
                moved: report.restored,
                failed: report.failed,
                duplicates: 0,
            },
        )?;

        report.summary = if report.failed == 0 {
            format!("successfully undone all {} file moves", report.restored)
        } else {
            format!(
                "undone {}/{total} files; {} errors occurred",
                report.restored, report.failed
            )
        };
        tracing::info!("undo of {operation_id}: {}", report.summary);
        Ok(report)
    }
}

fn restore(record: &MoveRecord) -> Result<(), String> {
    if !record.dest.exists() {
        return Err(format!(
            "destination no longer exists: {}",
            record.dest.display()
        ));
    }
    if record.source.exists() {
        return Err(format!(
            "original path is occupied: {}",
            record.source.display()
        ));
    }
    if let Some(parent) = record.source.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("cannot recreate {}: {e}", parent.display()))?;
    }
    match fs::rename(&record.dest, &record.source) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            // Cross-volume restore falls back to copy + delete.
            if fs::copy(&record.dest, &record.source).is_ok()
                && fs::remove_file(&record.dest).is_ok()
            {
                Ok(())
            } else {
                let _ = fs::remove_file(&record.source);
                Err(format!("failed to restore: {rename_err}"))
            }
        }
    }
}
