//! Error types for core data validation.

use thiserror::Error;

/// Result alias for projection data validation.
pub type ProjectionDataResult<T> = Result<T, ProjectionDataError>;

/// Errors raised when projection data is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionDataError {
    #[error("negative {dimension} count for '{key}': {count}")]
    NegativeCount {
        dimension: &'static str,
        key: String,
        count: i64,
    },

    #[error("{dimension} count for '{key}' is out of range: {count}")]
    CountOutOfRange {
        dimension: &'static str,
        key: String,
        count: i64,
    },
}
