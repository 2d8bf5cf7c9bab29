//! amgrid-core — leaf data types shared by every amgrid crate.
//!
//! ```text
//! ProjectionData ──(satisfy)──► SatisfyStateData
//!   any / hosts / racks           ├── ContainerAllocateData  (what to request)
//!                                 └── Vec<GridMember>        (what to release)
//! ```
//!
//! Resource-manager records (`Container`, `ContainerStatus`) are the inputs
//! the application master feeds into the grid and the monitor.

pub mod allocate;
pub mod config;
pub mod container;
pub mod error;
pub mod member;
pub mod projection;
pub mod satisfy;

pub use allocate::ContainerAllocateData;
pub use config::AmgridConfig;
pub use container::{Container, ContainerState, ContainerStatus, exit_status};
pub use error::{ProjectionDataError, ProjectionDataResult};
pub use member::{ContainerId, GridMember};
pub use projection::ProjectionData;
pub use satisfy::SatisfyStateData;
