use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Organize,
    Undo,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Organize => write!(f, "organize"),
            Self::Undo => write!(f, "undo"),
        }
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "organize" => Ok(Self::Organize),
            "undo" => Ok(Self::Undo),
            _ => Err(format!("unknown operation type: {s}")),
        }
    }
}

/// Lifecycle of one logged batch. `Completed` is the only state from which
/// an undo may start, and `UndoCompleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Created,
    Running,
    Completed,
    Cancelled,
    Failed,
    UndoRequested,
    UndoCompleted,
}

impl OperationStatus {
    pub fn is_undoable(self) -> bool {
        self == Self::Completed
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::UndoRequested => "undo_requested",
            Self::UndoCompleted => "undo_completed",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            "undo_requested" => Ok(Self::UndoRequested),
            "undo_completed" => Ok(Self::UndoCompleted),
            _ => Err(format!("unknown operation status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationStats {
    pub moved: usize,
    pub failed: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation_id: String,
    pub operation_type: OperationType,
    pub status: OperationStatus,
    pub source_dirs: Vec<String>,
    pub target_dir: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub stats: OperationStats,
}

/// One executed move. Immutable once written; owned by exactly one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRecord {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub size: u64,
    pub recorded_at: String,
}
