pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod models;
pub mod services;

pub use config::{DuplicateDetection, EngineConfig, UnclassifiedPolicy};
pub use context::CancelToken;
pub use error::EngineError;
pub use models::operation::{OperationRecord, OperationStats, OperationStatus, OperationType};
pub use models::plan::{ClassificationResult, FileError, FileRecord};
pub use services::classifier::{Classifier, ExtensionStrategy, Resolver, Strategy};
pub use services::oplog::UndoReport;
pub use services::scheduler::{
    Engine, OrganizeHandle, OrganizeRequest, OrganizeSummary, Progress, UndoHandle,
};
