use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::data::migrations;
use crate::error::EngineError;
use crate::models::operation::{
    MoveRecord, OperationRecord, OperationStats, OperationStatus,
};

/// Append-only operation log. Each append is one durable unit: a crash loses
/// at most the in-flight record, never prior history.
pub trait LogStore {
    fn begin_operation(&self, record: &OperationRecord) -> Result<(), EngineError>;
    fn append_move(&self, operation_id: &str, record: &MoveRecord) -> Result<(), EngineError>;
    fn set_status(&self, operation_id: &str, status: OperationStatus) -> Result<(), EngineError>;
    fn finish_operation(
        &self,
        operation_id: &str,
        status: OperationStatus,
        stats: &OperationStats,
    ) -> Result<(), EngineError>;
    fn get_operation(&self, operation_id: &str) -> Result<Option<OperationRecord>, EngineError>;
    fn recent_operations(&self, limit: usize) -> Result<Vec<OperationRecord>, EngineError>;
    /// Move records in insertion order.
    fn moves_for(&self, operation_id: &str) -> Result<Vec<MoveRecord>, EngineError>;
    /// Drop move records of all but the newest `keep` operations. Summary
    /// rows survive; only undo eligibility is lost. Returns pruned row count.
    fn compact(&self, keep: usize) -> Result<usize, EngineError>;
}

/// One registered file under a name, as seen by duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    pub hash: String,
    pub path: PathBuf,
    /// Modification time in unix seconds when it was known at insert.
    pub modified: Option<i64>,
}

/// Persisted hash -> first-seen-path index used by duplicate detection.
pub trait HashIndex {
    fn lookup_hash(&self, hash: &str) -> Result<Option<PathBuf>, EngineError>;
    /// All rows registered under a file name.
    fn lookup_name(&self, file_name: &str) -> Result<Vec<NameEntry>, EngineError>;
    fn insert_hash(
        &self,
        hash: &str,
        path: &Path,
        file_name: &str,
        size: u64,
        modified: Option<i64>,
    ) -> Result<(), EngineError>;
}

/// Learned filename-signature -> folder mappings from prior user corrections.
pub trait PatternStore {
    fn get_pattern(&self, signature: &str) -> Result<Option<(String, u32)>, EngineError>;
    fn record_pattern(&self, signature: &str, folder: &str) -> Result<(), EngineError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    fn row_to_operation(row: &rusqlite::Row<'_>) -> rusqlite::Result<OperationRecord> {
        let op_type: String = row.get(1)?;
        let status: String = row.get(2)?;
        let sources_json: String = row.get(3)?;
        Ok(OperationRecord {
            operation_id: row.get(0)?,
            operation_type: op_type.parse().unwrap_or(crate::models::operation::OperationType::Organize),
            status: status.parse().unwrap_or(OperationStatus::Failed),
            source_dirs: serde_json::from_str(&sources_json).unwrap_or_default(),
            target_dir: row.get(4)?,
            started_at: row.get(5)?,
            finished_at: row.get(6)?,
            stats: OperationStats {
                moved: row.get::<_, i64>(7)? as usize,
                failed: row.get::<_, i64>(8)? as usize,
                duplicates: row.get::<_, i64>(9)? as usize,
            },
        })
    }
}

const OPERATION_COLUMNS: &str = "operation_id, operation_type, status, source_dirs, target_dir, \
     started_at, finished_at, moved, failed, duplicates";

impl LogStore for SqliteStore {
    fn begin_operation(&self, record: &OperationRecord) -> Result<(), EngineError> {
        let sources_json = serde_json::to_string(&record.source_dirs)?;
        self.conn.execute(
            "INSERT INTO operations (operation_id, operation_type, status, source_dirs, target_dir, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.operation_id,
                record.operation_type.to_string(),
                record.status.to_string(),
                sources_json,
                record.target_dir,
                record.started_at,
            ],
        )?;
        Ok(())
    }

    fn append_move(&self, operation_id: &str, record: &MoveRecord) -> Result<(), EngineError> {
        self.conn.execute(
            "INSERT INTO move_records (operation_id, source, dest, size, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                operation_id,
                record.source.to_string_lossy(),
                record.dest.to_string_lossy(),
                record.size as i64,
                record.recorded_at,
            ],
        )?;
        Ok(())
    }

    fn set_status(&self, operation_id: &str, status: OperationStatus) -> Result<(), EngineError> {
        self.conn.execute(
            "UPDATE operations SET status = ?2 WHERE operation_id = ?1",
            params![operation_id, status.to_string()],
        )?;
        Ok(())
    }

    fn finish_operation(
        &self,
        operation_id: &str,
        status: OperationStatus,
        stats: &OperationStats,
    ) -> Result<(), EngineError> {
        self.conn.execute(
            "UPDATE operations
             SET status = ?2, finished_at = ?3, moved = ?4, failed = ?5, duplicates = ?6
             WHERE operation_id = ?1",
            params![
                operation_id,
                status.to_string(),
                chrono::Utc::now().to_rfc3339(),
                stats.moved as i64,
                stats.failed as i64,
                stats.duplicates as i64,
            ],
        )?;
        Ok(())
    }

    fn get_operation(&self, operation_id: &str) -> Result<Option<OperationRecord>, EngineError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OPERATION_COLUMNS} FROM operations WHERE operation_id = ?1"
        ))?;
        let record = stmt
            .query_row(params![operation_id], Self::row_to_operation)
            .optional()?;
        Ok(record)
    }

    fn recent_operations(&self, limit: usize) -> Result<Vec<OperationRecord>, EngineError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OPERATION_COLUMNS} FROM operations ORDER BY id DESC LIMIT ?1"
        ))?;
        let records = stmt
            .query_map(params![limit as i64], Self::row_to_operation)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    fn moves_for(&self, operation_id: &str) -> Result<Vec<MoveRecord>, EngineError> {
        let mut stmt = self.conn.prepare(
            "SELECT source, dest, size, recorded_at
             FROM move_records WHERE operation_id = ?1 ORDER BY id ASC",
        )?;
        let records = stmt
            .query_map(params![operation_id], |row| {
                let source: String = row.get(0)?;
                let dest: String = row.get(1)?;
                Ok(MoveRecord {
                    source: PathBuf::from(source),
                    dest: PathBuf::from(dest),
                    size: row.get::<_, i64>(2)? as u64,
                    recorded_at: row.get(3)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    fn compact(&self, keep: usize) -> Result<usize, EngineError> {
        let pruned = self.conn.execute(
            "DELETE FROM move_records WHERE operation_id NOT IN (
                 SELECT operation_id FROM operations ORDER BY id DESC LIMIT ?1
             )",
            params![keep as i64],
        )?;
        Ok(pruned)
    }
}

impl HashIndex for SqliteStore {
    fn lookup_hash(&self, hash: &str) -> Result<Option<PathBuf>, EngineError> {
        let mut stmt = self
            .conn
            .prepare("SELECT path FROM file_hashes WHERE hash = ?1")?;
        let path: Option<String> = stmt.query_row(params![hash], |row| row.get(0)).optional()?;
        Ok(path.map(PathBuf::from))
    }

    fn lookup_name(&self, file_name: &str) -> Result<Vec<NameEntry>, EngineError> {
        let mut stmt = self
            .conn
            .prepare("SELECT hash, path, modified FROM file_hashes WHERE file_name = ?1")?;
        let rows = stmt
            .query_map(params![file_name], |row| {
                let hash: String = row.get(0)?;
                let path: String = row.get(1)?;
                let modified: Option<i64> = row.get(2)?;
                Ok(NameEntry {
                    hash,
                    path: PathBuf::from(path),
                    modified,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    fn insert_hash(
        &self,
        hash: &str,
        path: &Path,
        file_name: &str,
        size: u64,
        modified: Option<i64>,
    ) -> Result<(), EngineError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO file_hashes (hash, path, file_name, size, modified, first_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                hash,
                path.to_string_lossy(),
                file_name,
                size as i64,
                modified,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl PatternStore for SqliteStore {
    fn get_pattern(&self, signature: &str) -> Result<Option<(String, u32)>, EngineError> {
        let mut stmt = self
            .conn
            .prepare("SELECT folder, count FROM learned_patterns WHERE signature = ?1")?;
        let row = stmt
            .query_row(params![signature], |row| {
                let folder: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((folder, count as u32))
            })
            .optional()?;
        Ok(row)
    }

    fn record_pattern(&self, signature: &str, folder: &str) -> Result<(), EngineError> {
        // Same folder again strengthens the mapping; a different choice
        // replaces it and starts the count over.
        self.conn.execute(
            "INSERT INTO learned_patterns (signature, folder, count, updated_at)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(signature) DO UPDATE SET
                 count = CASE WHEN learned_patterns.folder = excluded.folder
                              THEN learned_patterns.count + 1 ELSE 1 END,
                 folder = excluded.folder,
                 updated_at = excluded.updated_at",
            params![signature, folder, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
