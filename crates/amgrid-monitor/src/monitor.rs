//! Container monitor — lifecycle counters fed by the resource manager.
//!
//! Every report batch is applied under one lock and the resulting state is
//! published once, so observers never see a half-applied batch.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use amgrid_core::{Container, ContainerId, ContainerState, ContainerStatus, exit_status};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::state::ContainerMonitorState;

/// Observer of monitor state changes.
pub trait ContainerMonitorListener: Send + Sync {
    fn state_changed(&self, state: &ContainerMonitorState) -> anyhow::Result<()>;
}

#[derive(Default)]
struct Tracking {
    allocated: HashSet<ContainerId>,
    running: HashSet<ContainerId>,
    completed: HashSet<ContainerId>,
    failed: HashSet<ContainerId>,
}

impl Tracking {
    fn state(&self) -> ContainerMonitorState {
        ContainerMonitorState {
            allocated: self.allocated.len(),
            running: self.running.len(),
            completed: self.completed.len(),
            failed: self.failed.len(),
        }
    }

    fn is_terminal(&self, id: &ContainerId) -> bool {
        self.completed.contains(id) || self.failed.contains(id)
    }

    fn apply_container(&mut self, container: &Container) {
        let id = &container.id;
        match container.state {
            ContainerState::New => {
                // The RM reports an allocation once when granted. Seeing the
                // same id again is taken to mean it has started; this is a
                // heuristic, not a confirmed running signal.
                if self.allocated.remove(id) {
                    self.running.insert(id.clone());
                } else if !self.running.contains(id) && !self.is_terminal(id) {
                    self.allocated.insert(id.clone());
                }
            }
            ContainerState::Running => self.mark_running(id),
            ContainerState::Complete => {
                self.allocated.remove(id);
                self.running.remove(id);
            }
        }
    }

    fn apply_status(&mut self, status: &ContainerStatus) {
        let id = &status.container_id;
        match status.state {
            ContainerState::New => {
                if !self.allocated.contains(id) && !self.running.contains(id) && !self.is_terminal(id) {
                    self.allocated.insert(id.clone());
                }
            }
            ContainerState::Running => self.mark_running(id),
            ContainerState::Complete => {
                self.allocated.remove(id);
                self.running.remove(id);
                if self.is_terminal(id) {
                    debug!(container = %id, "ignoring repeated completion report");
                    return;
                }
                match status.exit_status {
                    exit_status::SUCCESS => {
                        self.completed.insert(id.clone());
                    }
                    exit_status::KILLED_BY_APPMASTER => {
                        debug!(container = %id, "container released by application master");
                    }
                    code => {
                        debug!(
                            container = %id,
                            exit_status = code,
                            diagnostics = %status.diagnostics,
                            "container failed"
                        );
                        self.failed.insert(id.clone());
                    }
                }
            }
        }
    }

    fn mark_running(&mut self, id: &ContainerId) {
        self.allocated.remove(id);
        if !self.is_terminal(id) {
            self.running.insert(id.clone());
        }
    }
}

/// Thread-safe tracker of allocated, running, completed and failed containers.
pub struct ContainerMonitor {
    tracking: Mutex<Tracking>,
    listeners: RwLock<Vec<Arc<dyn ContainerMonitorListener>>>,
    state_tx: watch::Sender<ContainerMonitorState>,
}

impl ContainerMonitor {
    pub fn new(listeners: Vec<Arc<dyn ContainerMonitorListener>>) -> Self {
        let (state_tx, _) = watch::channel(ContainerMonitorState::default());
        Self {
            tracking: Mutex::new(Tracking::default()),
            listeners: RwLock::new(listeners),
            state_tx,
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ContainerMonitorListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Receiver that always holds the most recently published state.
    pub fn subscribe(&self) -> watch::Receiver<ContainerMonitorState> {
        self.state_tx.subscribe()
    }

    /// Apply a batch of allocation reports.
    pub fn on_container(&self, containers: &[Container]) {
        let state = {
            let mut tracking = self.lock();
            for container in containers {
                if container.id.is_blank() {
                    warn!(host = %container.host, "ignoring container report with blank id");
                    continue;
                }
                tracking.apply_container(container);
            }
            self.publish(&tracking)
        };
        self.notify(&state);
    }

    /// Apply a batch of status reports, publishing once at the end.
    pub fn on_container_status(&self, statuses: &[ContainerStatus]) {
        self.on_container_status_with(statuses, false);
    }

    /// Apply a batch of status reports.
    ///
    /// With `notify_each` set, the state is published after every report
    /// instead of once per batch.
    pub fn on_container_status_with(&self, statuses: &[ContainerStatus], notify_each: bool) {
        let mut published = Vec::new();
        {
            let mut tracking = self.lock();
            for status in statuses {
                if status.container_id.is_blank() {
                    warn!(exit_status = status.exit_status, "ignoring status report with blank id");
                    continue;
                }
                tracking.apply_status(status);
                if notify_each {
                    published.push(self.publish(&tracking));
                }
            }
            if !notify_each {
                published.push(self.publish(&tracking));
            }
        }
        for state in &published {
            self.notify(state);
        }
    }

    pub fn state(&self) -> ContainerMonitorState {
        self.lock().state()
    }

    /// Containers allocated but not yet known to be running.
    pub fn free_count(&self) -> usize {
        self.lock().allocated.len()
    }

    pub fn running_count(&self) -> usize {
        self.lock().running.len()
    }

    pub fn completed_count(&self) -> usize {
        self.lock().completed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.lock().failed.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tracking> {
        self.tracking.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot `tracking` and push it to the watch channel. Called with
    /// the lock held so channel order matches apply order.
    fn publish(&self, tracking: &Tracking) -> ContainerMonitorState {
        let state = tracking.state();
        self.state_tx.send_replace(state);
        debug!(
            allocated = state.allocated,
            running = state.running,
            completed = state.completed,
            failed = state.failed,
            "container monitor state"
        );
        state
    }

    fn notify(&self, state: &ContainerMonitorState) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            if let Err(e) = listener.state_changed(state) {
                warn!(error = %e, "container monitor listener failed");
            }
        }
    }
}

impl Default for ContainerMonitor {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
