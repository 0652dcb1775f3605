use rusqlite::Connection;

use crate::error::EngineError;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS operations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation_id TEXT UNIQUE NOT NULL,
    operation_type TEXT NOT NULL,
    status TEXT NOT NULL,
    source_dirs TEXT NOT NULL,
    target_dir TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    moved INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    duplicates INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_operations_started ON operations(started_at DESC);

CREATE TABLE IF NOT EXISTS move_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation_id TEXT NOT NULL,
    source TEXT NOT NULL,
    dest TEXT NOT NULL,
    size INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_move_records_op ON move_records(operation_id);

CREATE TABLE IF NOT EXISTS file_hashes (
    hash TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    size INTEGER NOT NULL,
    modified INTEGER,
    first_seen TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_file_hashes_name ON file_hashes(file_name);

CREATE TABLE IF NOT EXISTS learned_patterns (
    signature TEXT PRIMARY KEY,
    folder TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL
);
";

pub fn run_migrations(conn: &Connection) -> Result<(), EngineError> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch(SCHEMA_V1)?;
    Ok(())
}
