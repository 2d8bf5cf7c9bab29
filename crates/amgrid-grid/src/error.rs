//! Grid error types.

use amgrid_core::ContainerId;
use thiserror::Error;

/// Errors raised by grid membership and projection lookup.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("member {id} rejected: {reason}")]
    Rejected { id: ContainerId, reason: String },

    #[error("unknown projection type '{requested}' (registered: {})", registered.join(", "))]
    UnknownProjectionType {
        requested: String,
        registered: Vec<String>,
    },
}

pub type GridResult<T> = Result<T, GridError>;
