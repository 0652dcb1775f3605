pub mod operation;
pub mod plan;
