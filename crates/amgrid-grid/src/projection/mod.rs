//! Grid projections — named allocation policies over a member subset.
//!
//! A projection owns the members it accepted and reconciles them toward its
//! `ProjectionData`. Members and data live behind a single lock inside
//! [`ProjectionCore`], so a satisfy computation always sees a matching pair.

mod any;
mod default;

pub use any::AnyGridProjection;
pub use default::DefaultGridProjection;

use std::sync::{Arc, PoisonError, RwLock};

use amgrid_core::{ContainerId, GridMember, ProjectionData, SatisfyStateData};

/// Allocation policy plus target for a subset of grid members.
///
/// Implementations supply the acceptance policy and the satisfy
/// computation; member bookkeeping is shared through [`ProjectionCore`].
pub trait GridProjection: Send + Sync {
    /// Registered type name of this projection.
    fn projection_type(&self) -> &str;

    fn core(&self) -> &ProjectionCore;

    /// Offer a member to this projection.
    ///
    /// Returns `true` if the projection now owns the member. Acceptance and
    /// the add itself happen under one lock, so two concurrent offers cannot
    /// both take the last free slot.
    fn accept_member(&self, member: &GridMember) -> bool;

    /// Diff between the projection data and the current members.
    fn satisfy_state(&self) -> SatisfyStateData;

    fn remove_member(&self, id: &ContainerId) -> Option<GridMember> {
        self.core().remove(id)
    }

    fn members(&self) -> Vec<GridMember> {
        self.core().members()
    }

    fn contains(&self, id: &ContainerId) -> bool {
        self.core().contains(id)
    }

    /// Replace the projection data as a whole.
    fn set_projection_data(&self, data: ProjectionData) {
        self.core().set_data(data);
    }

    fn projection_data(&self) -> Arc<ProjectionData> {
        self.core().data()
    }

    fn priority(&self) -> Option<u32> {
        self.core().priority()
    }

    /// Drop every member, returning what was held.
    fn clear_members(&self) -> Vec<GridMember> {
        self.core().clear()
    }

    /// A member with a priority only matches a projection with the same
    /// priority. Unset on either side matches.
    fn matches_priority(&self, member: &GridMember) -> bool {
        match (self.priority(), member.priority()) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => true,
        }
    }
}

struct ProjectionState {
    members: Vec<GridMember>,
    data: Arc<ProjectionData>,
    priority: Option<u32>,
}

/// Member list, projection data and priority behind one lock.
pub struct ProjectionCore {
    state: RwLock<ProjectionState>,
}

impl ProjectionCore {
    pub fn new(data: ProjectionData) -> Self {
        Self {
            state: RwLock::new(ProjectionState {
                members: Vec::new(),
                priority: data.priority,
                data: Arc::new(data),
            }),
        }
    }

    /// Consistent copy of the members and the data they are measured against.
    pub fn snapshot(&self) -> (Vec<GridMember>, Arc<ProjectionData>) {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        (state.members.clone(), state.data.clone())
    }

    /// Add `member` if `policy` allows it, evaluated under the write lock.
    ///
    /// A member already held is reported as accepted without re-running the
    /// policy.
    pub fn try_add(
        &self,
        member: &GridMember,
        policy: impl FnOnce(&[GridMember], &ProjectionData) -> bool,
    ) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.members.iter().any(|m| m.id() == member.id()) {
            return true;
        }
        if !policy(&state.members[..], state.data.as_ref()) {
            return false;
        }
        state.members.push(member.clone());
        true
    }

    pub fn remove(&self, id: &ContainerId) -> Option<GridMember> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let idx = state.members.iter().position(|m| m.id() == id)?;
        Some(state.members.remove(idx))
    }

    pub fn members(&self) -> Vec<GridMember> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .members
            .clone()
    }

    pub fn contains(&self, id: &ContainerId) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.members.iter().any(|m| m.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .members
            .is_empty()
    }

    /// Swap in new data. A priority carried by the data replaces the
    /// projection priority.
    pub fn set_data(&self, data: ProjectionData) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if data.priority.is_some() {
            state.priority = data.priority;
        }
        state.data = Arc::new(data);
    }

    pub fn data(&self) -> Arc<ProjectionData> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .data
            .clone()
    }

    pub fn priority(&self) -> Option<u32> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).priority
    }

    pub fn clear(&self) -> Vec<GridMember> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut state.members)
    }
}
