//! Cluster error types.

use amgrid_grid::GridError;
use thiserror::Error;

use crate::state::{ClusterAction, ClusterState};

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("invalid state transition for cluster '{cluster_id}': cannot {action} while {state}")]
    InvalidTransition {
        cluster_id: String,
        state: ClusterState,
        action: ClusterAction,
    },

    #[error("no such cluster: {0}")]
    NoSuchCluster(String),

    #[error("cluster already exists: {0}")]
    ClusterExists(String),

    #[error("unknown cluster definition: {0}")]
    UnknownClusterDef(String),

    #[error("cluster '{0}' has no projection type")]
    MissingProjectionType(String),

    #[error(transparent)]
    Grid(#[from] GridError),
}

pub type ClusterResult<T> = Result<T, ClusterError>;
