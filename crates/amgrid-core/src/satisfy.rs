//! Satisfy state — the diff between a projection's target and its members.

use serde::{Deserialize, Serialize};

use crate::allocate::ContainerAllocateData;
use crate::member::{ContainerId, GridMember};

/// Result of one satisfy computation.
///
/// Always derived fresh from the current members and projection data; never
/// cached across calls. A member appears in `remove_data` at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SatisfyStateData {
    pub allocate_data: ContainerAllocateData,
    pub remove_data: Vec<GridMember>,
}

impl SatisfyStateData {
    pub fn new(allocate_data: ContainerAllocateData, remove_data: Vec<GridMember>) -> Self {
        Self {
            allocate_data,
            remove_data,
        }
    }

    /// Release-only diff: nothing to allocate, everything given is removed.
    pub fn release_all(members: Vec<GridMember>) -> Self {
        Self {
            allocate_data: ContainerAllocateData::default(),
            remove_data: members,
        }
    }

    /// Nothing to allocate and nothing to remove.
    pub fn is_satisfied(&self) -> bool {
        !self.allocate_data.has_data() && self.remove_data.is_empty()
    }

    pub fn remove_ids(&self) -> Vec<ContainerId> {
        self.remove_data.iter().map(|m| m.id().clone()).collect()
    }
}
