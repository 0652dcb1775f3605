pub mod classifier;
pub mod collector;
pub mod dupes;
pub mod learned;
pub mod mover;
pub mod oplog;
pub mod path_validator;
pub mod sanitize;
pub mod scheduler;
