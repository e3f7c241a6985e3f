//! Portfolio dataset construction
//!
//! Loads the raw policy and claim extracts, joins claims onto policies,
//! and reads and writes the serialized hand-off tables used by the
//! exploration and modelling stages.

pub mod data;
pub mod loader;
pub mod merge;
pub mod synthetic;

use thiserror::Error;

/// Errors raised while loading, joining, or writing portfolio tables
#[derive(Debug, Error)]
pub enum DataError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not parse {field} from {value:?}")]
    Parse { field: &'static str, value: String },

    #[error("unknown {field} level {value:?}")]
    UnknownLevel { field: &'static str, value: String },

    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error("duplicate policy id {policy_id}")]
    DuplicatePolicy { policy_id: u64 },

    #[error("claim references policy id {policy_id} absent from the policy table")]
    MissingPolicy { policy_id: u64 },

    #[error("policy {policy_id} stores claim count {stored} but {attached} claims were attached")]
    ClaimCountMismatch {
        policy_id: u64,
        stored: u32,
        attached: u32,
    },
}
