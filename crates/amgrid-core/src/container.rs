//! Resource-manager records fed into the engine.
//!
//! These mirror what a resource-manager client delivers on its callback
//! thread: allocated containers and container status reports.

use serde::{Deserialize, Serialize};

use crate::member::{ContainerId, GridMember};

/// Exit statuses reported by the resource manager for completed containers.
pub mod exit_status {
    pub const SUCCESS: i32 = 0;
    pub const INVALID: i32 = -1000;
    /// Container was aborted, e.g. released on a lost node.
    pub const ABORTED: i32 = -100;
    pub const DISKS_FAILED: i32 = -101;
    pub const PREEMPTED: i32 = -102;
    pub const KILLED_EXCEEDED_VMEM: i32 = -103;
    pub const KILLED_EXCEEDED_PMEM: i32 = -104;
    /// The application master released the container on purpose.
    pub const KILLED_BY_APPMASTER: i32 = -105;
    pub const KILLED_BY_RESOURCEMANAGER: i32 = -106;
    pub const KILLED_AFTER_APP_COMPLETION: i32 = -107;
}

/// Container lifecycle state as seen by the resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerState {
    New,
    Running,
    Complete,
}

/// An allocated container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub host: String,
    #[serde(default)]
    pub rack: Option<String>,
    #[serde(default)]
    pub priority: Option<u32>,
    pub state: ContainerState,
}

impl Container {
    pub fn new(id: impl Into<ContainerId>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            rack: None,
            priority: None,
            state: ContainerState::New,
        }
    }

    pub fn with_rack(mut self, rack: impl Into<String>) -> Self {
        self.rack = Some(rack.into());
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_state(mut self, state: ContainerState) -> Self {
        self.state = state;
        self
    }

    /// Build the grid member representing this container.
    pub fn to_member(&self) -> GridMember {
        let mut member = GridMember::new(self.id.clone(), self.host.clone());
        if let Some(rack) = &self.rack {
            member = member.with_rack(rack.clone());
        }
        if let Some(priority) = self.priority {
            member = member.with_priority(priority);
        }
        member
    }
}

/// A status report for a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub container_id: ContainerId,
    pub state: ContainerState,
    pub exit_status: i32,
    #[serde(default)]
    pub diagnostics: String,
}

impl ContainerStatus {
    pub fn new(container_id: impl Into<ContainerId>, state: ContainerState, exit_status: i32) -> Self {
        Self {
            container_id: container_id.into(),
            state,
            exit_status,
            diagnostics: String::new(),
        }
    }

    /// A COMPLETE status with the given exit code.
    pub fn complete(container_id: impl Into<ContainerId>, exit_status: i32) -> Self {
        Self::new(container_id, ContainerState::Complete, exit_status)
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = diagnostics.into();
        self
    }
}
