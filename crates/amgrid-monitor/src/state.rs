use serde::Serialize;

/// Point-in-time counts of the four tracking sets.
///
/// Always taken as one unit under the monitor lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContainerMonitorState {
    pub allocated: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl ContainerMonitorState {
    /// Containers the monitor still considers alive.
    pub fn live(&self) -> usize {
        self.allocated + self.running
    }

    /// Fraction of seen containers that reached a terminal state.
    pub fn progress(&self) -> f64 {
        let total = self.live() + self.completed + self.failed;
        if total == 0 {
            return 0.0;
        }
        (self.completed + self.failed) as f64 / total as f64
    }
}
