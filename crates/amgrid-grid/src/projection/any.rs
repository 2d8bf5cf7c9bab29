use amgrid_core::{GridMember, ProjectionData, SatisfyStateData};

use super::{GridProjection, ProjectionCore};
use crate::satisfy::compute_satisfy_state;

/// Projection that takes any member regardless of placement.
///
/// Only the `any` count of its data is reconciled; host and rack entries
/// are ignored.
pub struct AnyGridProjection {
    core: ProjectionCore,
}

impl AnyGridProjection {
    pub const TYPE: &'static str = "any";

    pub fn new(data: ProjectionData) -> Self {
        Self {
            core: ProjectionCore::new(data),
        }
    }
}

impl GridProjection for AnyGridProjection {
    fn projection_type(&self) -> &str {
        Self::TYPE
    }

    fn core(&self) -> &ProjectionCore {
        &self.core
    }

    fn accept_member(&self, member: &GridMember) -> bool {
        self.matches_priority(member) && self.core.try_add(member, |_, _| true)
    }

    fn satisfy_state(&self) -> SatisfyStateData {
        let (members, data) = self.core.snapshot();
        compute_satisfy_state(&members, &data.any_only())
    }
}
