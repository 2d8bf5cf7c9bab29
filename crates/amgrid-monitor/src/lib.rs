//! amgrid-monitor — container lifecycle tracking for the application master.
//!
//! Two resource-manager feeds drive the monitor: allocation reports and
//! container status reports. Both may arrive on different threads.
//!
//! # Architecture
//!
//! ```text
//! ContainerMonitor
//!   ├── Mutex<Tracking>      allocated / running / completed / failed sets
//!   ├── listeners            called once per applied batch
//!   └── watch::Sender        latest ContainerMonitorState for async readers
//!
//! unseen ──► allocated ──► running ──► completed (exit 0)
//!                 │            └─────► failed    (any other exit)
//!                 └──────────────────► released  (KILLED_BY_APPMASTER, untracked)
//! ```

pub mod monitor;
pub mod state;

pub use monitor::{ContainerMonitor, ContainerMonitorListener};
pub use state::ContainerMonitorState;
