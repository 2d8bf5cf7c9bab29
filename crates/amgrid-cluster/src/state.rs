use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a container cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    /// Created, projection attached, nothing requested yet.
    Initial,
    /// Reconciling toward the projection data.
    Running,
    /// Releasing members; no new allocations.
    Stopping,
    /// All members released; may be started again.
    Stopped,
    /// Terminal.
    Destroyed,
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initial => "INITIAL",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Destroyed => "DESTROYED",
        };
        f.write_str(s)
    }
}

/// Operator-requested lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterAction {
    Start,
    Stop,
    Modify,
    Destroy,
}

impl fmt::Display for ClusterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Modify => "modify",
            Self::Destroy => "destroy",
        };
        f.write_str(s)
    }
}
