//! amgrid-cluster — container clusters and the application-master coordinator.
//!
//! A container cluster is a projection plus a lifecycle. The
//! `ClusterManager` owns every cluster on a shared grid, turns satisfy
//! diffs into allocation and release calls, and feeds resource-manager
//! events back into the grid and the container monitor.
//!
//! # Architecture
//!
//! ```text
//! ClusterManager
//!   ├── ProjectedGrid ── one projection per cluster
//!   ├── ContainerMonitor
//!   ├── clusters: id → ContainerCluster + AllocationTracker
//!   ├── kill queue (queued, pending release)
//!   └── ContainerAllocator (resource-manager seam)
//!
//! reconcile():
//!   for each cluster
//!     satisfy() ─► remove_data  ─► kill queue ─► allocator.release()
//!               └► allocate_data ─► tracker (minus outstanding) ─► allocator.allocate()
//!
//! ContainerCluster lifecycle:
//!   INITIAL ──start──► RUNNING ──stop──► STOPPING ──(empty)──► STOPPED
//!      │                  ▲  └─modify─┘                          │
//!      │                  └──────────────────start───────────────┘
//!      └──────── destroy (from any state) ──► DESTROYED
//! ```

pub mod allocator;
pub mod cluster;
pub mod error;
pub mod manager;
pub mod state;
pub mod tracker;

pub use allocator::ContainerAllocator;
pub use cluster::{ClusterStateListener, ClusterView, ContainerCluster, ProjectionView};
pub use error::{ClusterError, ClusterResult};
pub use manager::{ClusterManager, CreateClusterRequest};
pub use state::{ClusterAction, ClusterState};
pub use tracker::AllocationTracker;
