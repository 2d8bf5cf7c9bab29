//! Grid — the authoritative membership registry.
//!
//! Members are kept in insertion order so that eviction decisions made by
//! projections are deterministic. Reads return point-in-time snapshots and
//! never hold the lock while callers iterate.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use amgrid_core::{ContainerId, GridMember};
use tracing::{debug, warn};

use crate::error::GridResult;

/// Observer of grid membership changes.
///
/// Called synchronously after the grid has committed the change. A failing
/// listener is logged and skipped; it never affects other listeners or the
/// grid itself.
pub trait GridListener: Send + Sync {
    fn member_added(&self, _member: &GridMember) -> anyhow::Result<()> {
        Ok(())
    }

    fn member_removed(&self, _member: &GridMember) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Hook run before a member is committed to the grid.
///
/// Returning a member (possibly a transformed one) lets the addition
/// proceed; returning an error vetoes it and the error is surfaced from
/// [`Grid::add_member`].
pub trait GridMemberInterceptor: Send + Sync {
    fn pre_add(&self, member: GridMember) -> GridResult<GridMember>;
}

/// Membership registry with listener notification and add interceptors.
#[derive(Default)]
pub struct Grid {
    members: RwLock<Vec<GridMember>>,
    listeners: RwLock<Vec<Arc<dyn GridListener>>>,
    interceptors: RwLock<Vec<Arc<dyn GridMemberInterceptor>>>,
    /// Runs after every other interceptor, right before the commit.
    admission: RwLock<Option<Arc<dyn GridMemberInterceptor>>>,
    /// Serializes adds from the duplicate check through the commit.
    adding: Mutex<()>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a grid with listeners registered up front.
    pub fn with_listeners(listeners: Vec<Arc<dyn GridListener>>) -> Self {
        Self {
            listeners: RwLock::new(listeners),
            ..Self::default()
        }
    }

    /// Add a member.
    ///
    /// Returns `Ok(false)` if a member with the same id is already present.
    /// Interceptors run in registration order, then the admission
    /// interceptor; a veto from any of them is returned as an error and
    /// leaves the grid unchanged. Adds are serialized, so interceptors must
    /// not call back into `add_member`.
    pub fn add_member(&self, member: GridMember) -> GridResult<bool> {
        let member = {
            let _adding = self.adding.lock().unwrap_or_else(PoisonError::into_inner);
            if self.contains(member.id()) {
                debug!(member = %member.id(), "member already in grid");
                return Ok(false);
            }

            let mut member = member;
            for interceptor in self.interceptors() {
                member = interceptor.pre_add(member)?;
            }
            if let Some(admission) = self.admission() {
                member = admission.pre_add(member)?;
            }

            self.members
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(member.clone());
            member
        };

        debug!(member = %member.id(), host = member.host(), "member added to grid");
        for listener in self.listeners() {
            if let Err(e) = listener.member_added(&member) {
                warn!(member = %member.id(), error = %e, "grid listener failed on member added");
            }
        }
        Ok(true)
    }

    /// Remove a member by id. Returns `false` if no such member exists.
    pub fn remove_member(&self, id: &ContainerId) -> bool {
        let removed = {
            let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
            members
                .iter()
                .position(|m| m.id() == id)
                .map(|idx| members.remove(idx))
        };

        let Some(member) = removed else {
            return false;
        };

        debug!(member = %id, "member removed from grid");
        for listener in self.listeners() {
            if let Err(e) = listener.member_removed(&member) {
                warn!(member = %id, error = %e, "grid listener failed on member removed");
            }
        }
        true
    }

    pub fn member(&self, id: &ContainerId) -> Option<GridMember> {
        let members = self.members.read().unwrap_or_else(PoisonError::into_inner);
        members.iter().find(|m| m.id() == id).cloned()
    }

    /// Snapshot of all members in insertion order.
    pub fn members(&self) -> Vec<GridMember> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, id: &ContainerId) -> bool {
        let members = self.members.read().unwrap_or_else(PoisonError::into_inner);
        members.iter().any(|m| m.id() == id)
    }

    pub fn len(&self) -> usize {
        self.members.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_grid_listener(&self, listener: Arc<dyn GridListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Append an interceptor to the end of the chain.
    pub fn add_interceptor(&self, interceptor: Arc<dyn GridMemberInterceptor>) {
        self.interceptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(interceptor);
    }

    /// Replace the interceptor chain. The admission interceptor is kept.
    pub fn set_interceptors(&self, interceptors: Vec<Arc<dyn GridMemberInterceptor>>) {
        *self.interceptors.write().unwrap_or_else(PoisonError::into_inner) = interceptors;
    }

    /// Install the interceptor that runs last, after the whole chain.
    ///
    /// An interceptor that takes ownership of the member belongs here: once
    /// it returns `Ok`, nothing else can veto the add.
    pub fn set_admission(&self, interceptor: Arc<dyn GridMemberInterceptor>) {
        *self.admission.write().unwrap_or_else(PoisonError::into_inner) = Some(interceptor);
    }

    fn listeners(&self) -> Vec<Arc<dyn GridListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn admission(&self) -> Option<Arc<dyn GridMemberInterceptor>> {
        self.admission
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn interceptors(&self) -> Vec<Arc<dyn GridMemberInterceptor>> {
        self.interceptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
