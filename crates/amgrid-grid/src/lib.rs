//! amgrid-grid — container membership and projection reconciliation.
//!
//! A `Grid` is the authoritative set of allocated containers. A
//! `ProjectedGrid` splits that set between `GridProjection`s: each incoming
//! member is offered to the projections in priority order and the first one
//! that accepts owns it.
//!
//! # Architecture
//!
//! ```text
//! Grid
//!   ├── interceptors (run before a member is committed; may veto)
//!   │   └── ProjectionAcceptor ── offers member to projections
//!   └── listeners (notified after add/remove, in registration order)
//!       └── ProjectionSync ── drops member from its projection
//!
//! GridProjection (default | any | custom)
//!   ├── accept_member()  policy check against ProjectionData quotas
//!   └── satisfy_state()  ProjectionData vs members → SatisfyStateData
//! ```
//!
//! Projection implementations are looked up by type name through a
//! `GridProjectionFactoryLocator`, composed once at construction.

pub mod error;
pub mod factory;
pub mod grid;
pub mod projected;
pub mod projection;
pub mod satisfy;

pub use error::{GridError, GridResult};
pub use factory::{DefaultGridProjectionFactory, GridProjectionFactory, GridProjectionFactoryLocator};
pub use grid::{Grid, GridListener, GridMemberInterceptor};
pub use projected::{ProjectedGrid, ProjectedGridListener};
pub use projection::{AnyGridProjection, DefaultGridProjection, GridProjection, ProjectionCore};
pub use satisfy::{Classification, classify, compute_satisfy_state};
