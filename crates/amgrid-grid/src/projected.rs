//! ProjectedGrid — a grid whose members are partitioned between projections.
//!
//! ```text
//! Grid::add_member(m)
//!   ├── user interceptors (may veto before any projection sees m)
//!   └── ProjectionAcceptor (admission, always last)
//!         offer m to projections by priority ─► first accept owns m
//!         nobody accepts ─► GridError::Rejected
//!   └── ProjectionSync (listener)
//!         added   ─► ProjectedGridListener::member_added(owner, m)
//!         removed ─► owner.remove_member(m) ─► member_removed(owner, m)
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use amgrid_core::{ContainerId, GridMember};
use tracing::{debug, warn};

use crate::error::{GridError, GridResult};
use crate::grid::{Grid, GridListener, GridMemberInterceptor};
use crate::projection::GridProjection;

/// Observer of projection membership.
pub trait ProjectedGridListener: Send + Sync {
    fn projection_added(&self, _projection: &Arc<dyn GridProjection>) -> anyhow::Result<()> {
        Ok(())
    }

    fn projection_removed(&self, _projection: &Arc<dyn GridProjection>) -> anyhow::Result<()> {
        Ok(())
    }

    fn member_added(
        &self,
        _projection: &Arc<dyn GridProjection>,
        _member: &GridMember,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn member_removed(
        &self,
        _projection: &Arc<dyn GridProjection>,
        _member: &GridMember,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Registry {
    projections: RwLock<Vec<Arc<dyn GridProjection>>>,
    listeners: RwLock<Vec<Arc<dyn ProjectedGridListener>>>,
}

impl Registry {
    fn projections(&self) -> Vec<Arc<dyn GridProjection>> {
        self.projections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Projections in offer order: ascending priority, unset last.
    fn by_priority(&self) -> Vec<Arc<dyn GridProjection>> {
        let mut projections = self.projections();
        projections.sort_by_key(|p| (p.priority().is_none(), p.priority()));
        projections
    }

    fn owner_of(&self, id: &ContainerId) -> Option<Arc<dyn GridProjection>> {
        self.projections().into_iter().find(|p| p.contains(id))
    }

    fn notify(&self, event: &str, f: impl Fn(&dyn ProjectedGridListener) -> anyhow::Result<()>) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            if let Err(e) = f(listener.as_ref()) {
                warn!(event = event, error = %e, "projected grid listener failed");
            }
        }
    }
}

struct ProjectionAcceptor {
    registry: Arc<Registry>,
}

impl GridMemberInterceptor for ProjectionAcceptor {
    fn pre_add(&self, member: GridMember) -> GridResult<GridMember> {
        for projection in self.registry.by_priority() {
            if projection.accept_member(&member) {
                debug!(
                    member = %member.id(),
                    projection_type = projection.projection_type(),
                    "member accepted by projection"
                );
                return Ok(member);
            }
        }
        debug!(member = %member.id(), host = member.host(), "no projection accepted member");
        Err(GridError::Rejected {
            id: member.id().clone(),
            reason: "no projection accepted member".into(),
        })
    }
}

struct ProjectionSync {
    registry: Arc<Registry>,
}

impl GridListener for ProjectionSync {
    fn member_added(&self, member: &GridMember) -> anyhow::Result<()> {
        if let Some(owner) = self.registry.owner_of(member.id()) {
            self.registry
                .notify("member_added", |l| l.member_added(&owner, member));
        }
        Ok(())
    }

    fn member_removed(&self, member: &GridMember) -> anyhow::Result<()> {
        for projection in self.registry.projections() {
            if let Some(removed) = projection.remove_member(member.id()) {
                self.registry
                    .notify("member_removed", |l| l.member_removed(&projection, &removed));
            }
        }
        Ok(())
    }
}

/// A [`Grid`] whose members are owned by projections.
pub struct ProjectedGrid {
    grid: Arc<Grid>,
    registry: Arc<Registry>,
}

impl ProjectedGrid {
    /// Wrap `grid`, installing the projection admission interceptor and
    /// listener. Interceptors added to the grid later still run before the
    /// projections are offered the member.
    pub fn new(grid: Arc<Grid>) -> Self {
        let registry = Arc::new(Registry::default());
        grid.set_admission(Arc::new(ProjectionAcceptor {
            registry: registry.clone(),
        }));
        grid.add_grid_listener(Arc::new(ProjectionSync {
            registry: registry.clone(),
        }));
        Self { grid, registry }
    }

    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    pub fn add_projection(&self, projection: Arc<dyn GridProjection>) {
        self.registry
            .projections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(projection.clone());
        self.registry
            .notify("projection_added", |l| l.projection_added(&projection));
    }

    /// Detach `projection`. Returns `false` if it was not registered.
    pub fn remove_projection(&self, projection: &Arc<dyn GridProjection>) -> bool {
        let removed = {
            let mut projections = self
                .registry
                .projections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let before = projections.len();
            projections.retain(|p| !Arc::ptr_eq(p, projection));
            projections.len() != before
        };
        if removed {
            self.registry
                .notify("projection_removed", |l| l.projection_removed(projection));
        }
        removed
    }

    pub fn projections(&self) -> Vec<Arc<dyn GridProjection>> {
        self.registry.projections()
    }

    /// The projection currently owning member `id`.
    pub fn projection_of(&self, id: &ContainerId) -> Option<Arc<dyn GridProjection>> {
        self.registry.owner_of(id)
    }

    pub fn add_projected_grid_listener(&self, listener: Arc<dyn ProjectedGridListener>) {
        self.registry
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}
