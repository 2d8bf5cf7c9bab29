//! ContainerCluster — a projection with a lifecycle.
//!
//! Every transition runs with the state lock held from check to commit, so
//! a destroy arriving from the management surface cannot interleave with a
//! start or modify. Listeners are called after the lock is released, in
//! commit order: each transition takes a ticket under the state lock and
//! waits for its turn before reporting.

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};

use amgrid_core::{GridMember, ProjectionData, SatisfyStateData};
use amgrid_grid::GridProjection;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ClusterError, ClusterResult};
use crate::state::{ClusterAction, ClusterState};

/// Observer of cluster state transitions.
///
/// Listeners may read the cluster but must not drive a transition of the
/// cluster that is reporting to them.
pub trait ClusterStateListener: Send + Sync {
    fn state_changed(&self, cluster_id: &str, from: ClusterState, to: ClusterState) -> anyhow::Result<()>;
}

/// Serializable snapshot of a cluster for the management surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_def: Option<String>,
    pub projection: ProjectionView,
    pub satisfy_state: Option<SatisfyStateData>,
    pub cluster_state: ClusterState,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_properties: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionView {
    #[serde(rename = "type")]
    pub projection_type: String,
    pub priority: Option<u32>,
    pub projection_data: ProjectionData,
    pub members: Vec<GridMember>,
}

pub struct ContainerCluster {
    id: String,
    cluster_def: Option<String>,
    extra_properties: BTreeMap<String, serde_json::Value>,
    projection: Arc<dyn GridProjection>,
    state: Mutex<ClusterState>,
    /// Tickets issued under the state lock and reported so far.
    tickets: Mutex<Tickets>,
    turn: Condvar,
    listeners: RwLock<Vec<Arc<dyn ClusterStateListener>>>,
}

#[derive(Default)]
struct Tickets {
    issued: u64,
    reported: u64,
}

/// Held while a transition is reported; hands the turn on when dropped.
struct Turn<'a> {
    cluster: &'a ContainerCluster,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        self.cluster.tickets().reported += 1;
        self.cluster.turn.notify_all();
    }
}

impl ContainerCluster {
    /// Create a cluster in `INITIAL` with its projection attached.
    pub fn new(id: impl Into<String>, projection: Arc<dyn GridProjection>) -> Self {
        Self {
            id: id.into(),
            cluster_def: None,
            extra_properties: BTreeMap::new(),
            projection,
            state: Mutex::new(ClusterState::Initial),
            tickets: Mutex::new(Tickets::default()),
            turn: Condvar::new(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn with_cluster_def(mut self, cluster_def: Option<String>) -> Self {
        self.cluster_def = cluster_def;
        self
    }

    pub fn with_extra_properties(mut self, extra: BTreeMap<String, serde_json::Value>) -> Self {
        self.extra_properties = extra;
        self
    }

    pub fn with_listeners(self, listeners: Vec<Arc<dyn ClusterStateListener>>) -> Self {
        *self.listeners.write().unwrap_or_else(PoisonError::into_inner) = listeners;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cluster_def(&self) -> Option<&str> {
        self.cluster_def.as_deref()
    }

    pub fn extra_properties(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extra_properties
    }

    pub fn projection(&self) -> &Arc<dyn GridProjection> {
        &self.projection
    }

    pub fn state(&self) -> ClusterState {
        *self.lock()
    }

    pub fn add_listener(&self, listener: Arc<dyn ClusterStateListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// `INITIAL | STOPPED → RUNNING`. Returns the first satisfy diff.
    pub fn start(&self) -> ClusterResult<SatisfyStateData> {
        let (from, satisfy, ticket) = {
            let mut state = self.lock();
            let from = *state;
            match from {
                ClusterState::Initial | ClusterState::Stopped => {
                    *state = ClusterState::Running;
                    (from, self.projection.satisfy_state(), self.ticket())
                }
                _ => return Err(self.invalid(from, ClusterAction::Start)),
            }
        };
        self.transitioned(ticket, from, ClusterState::Running);
        Ok(satisfy)
    }

    /// `RUNNING → STOPPING`, settling straight into `STOPPED` when the
    /// projection is already empty. Returns the members to release.
    pub fn stop(&self) -> ClusterResult<Vec<GridMember>> {
        let (members, to, ticket) = {
            let mut state = self.lock();
            if *state != ClusterState::Running {
                return Err(self.invalid(*state, ClusterAction::Stop));
            }
            let members = self.projection.members();
            let to = if members.is_empty() {
                ClusterState::Stopped
            } else {
                ClusterState::Stopping
            };
            *state = to;
            (members, to, self.ticket())
        };
        self.transitioned(ticket, ClusterState::Running, to);
        Ok(members)
    }

    /// Replace the projection data. Only allowed while `RUNNING`.
    pub fn modify(&self, data: ProjectionData) -> ClusterResult<SatisfyStateData> {
        let state = self.lock();
        if *state != ClusterState::Running {
            return Err(self.invalid(*state, ClusterAction::Modify));
        }
        self.projection.set_projection_data(data);
        info!(cluster = %self.id, "cluster projection data modified");
        Ok(self.projection.satisfy_state())
    }

    /// Move to `DESTROYED`, dropping listeners and handing back every
    /// member the projection held. Destroying twice is a no-op.
    pub fn destroy(&self) -> Vec<GridMember> {
        let (from, members, ticket) = {
            let mut state = self.lock();
            let from = *state;
            if from == ClusterState::Destroyed {
                return Vec::new();
            }
            *state = ClusterState::Destroyed;
            (from, self.projection.clear_members(), self.ticket())
        };
        self.transitioned(ticket, from, ClusterState::Destroyed);
        members
    }

    /// Called after a member left the projection. A stopping cluster whose
    /// projection became empty settles into `STOPPED`.
    pub fn on_member_removed(&self) {
        let settled = {
            let mut state = self.lock();
            if *state == ClusterState::Stopping && self.projection.core().is_empty() {
                *state = ClusterState::Stopped;
                Some(self.ticket())
            } else {
                None
            }
        };
        if let Some(ticket) = settled {
            self.transitioned(ticket, ClusterState::Stopping, ClusterState::Stopped);
        }
    }

    /// Current diff for the reconcile loop.
    ///
    /// A running cluster reports the full projection diff. A stopping one
    /// only asks for its remaining members to be released, and so does an
    /// idle one that picked up stray members.
    pub fn satisfy(&self) -> Option<SatisfyStateData> {
        let state = self.lock();
        match *state {
            ClusterState::Running => Some(self.projection.satisfy_state()),
            ClusterState::Stopping => Some(SatisfyStateData::release_all(self.projection.members())),
            ClusterState::Initial | ClusterState::Stopped if !self.projection.core().is_empty() => {
                Some(SatisfyStateData::release_all(self.projection.members()))
            }
            _ => None,
        }
    }

    pub fn view(&self) -> ClusterView {
        let state = self.state();
        let satisfy_state = match state {
            ClusterState::Initial | ClusterState::Stopped | ClusterState::Destroyed => None,
            _ => self.satisfy(),
        };
        ClusterView {
            id: self.id.clone(),
            cluster_def: self.cluster_def.clone(),
            projection: ProjectionView {
                projection_type: self.projection.projection_type().to_string(),
                priority: self.projection.priority(),
                projection_data: self.projection.projection_data().as_ref().clone(),
                members: self.projection.members(),
            },
            satisfy_state,
            cluster_state: state,
            extra_properties: self.extra_properties.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next reporting ticket. Call with the state lock held.
    fn ticket(&self) -> u64 {
        let mut tickets = self.tickets();
        let ticket = tickets.issued;
        tickets.issued += 1;
        ticket
    }

    fn tickets(&self) -> MutexGuard<'_, Tickets> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn invalid(&self, state: ClusterState, action: ClusterAction) -> ClusterError {
        warn!(cluster = %self.id, %state, %action, "invalid cluster state transition");
        ClusterError::InvalidTransition {
            cluster_id: self.id.clone(),
            state,
            action,
        }
    }

    fn transitioned(&self, ticket: u64, from: ClusterState, to: ClusterState) {
        let _turn = self.wait_turn(ticket);
        info!(cluster = %self.id, %from, %to, "cluster state changed");
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            if let Err(e) = listener.state_changed(&self.id, from, to) {
                warn!(cluster = %self.id, error = %e, "cluster state listener failed");
            }
        }
        if to == ClusterState::Destroyed {
            self.listeners
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }

    fn wait_turn(&self, ticket: u64) -> Turn<'_> {
        let mut tickets = self.tickets();
        while tickets.reported != ticket {
            tickets = self
                .turn
                .wait(tickets)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Turn { cluster: self }
    }
}
