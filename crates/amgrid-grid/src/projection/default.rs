use amgrid_core::{GridMember, ProjectionData, SatisfyStateData};

use super::{GridProjection, ProjectionCore};
use crate::satisfy::{classify, compute_satisfy_state};

/// Host and rack aware projection.
///
/// Accepts a member only while its host quota, its rack quota or the any
/// pool still has room. Satisfy reconciles every declared dimension.
pub struct DefaultGridProjection {
    core: ProjectionCore,
}

impl DefaultGridProjection {
    pub const TYPE: &'static str = "default";

    pub fn new(data: ProjectionData) -> Self {
        Self {
            core: ProjectionCore::new(data),
        }
    }
}

impl GridProjection for DefaultGridProjection {
    fn projection_type(&self) -> &str {
        Self::TYPE
    }

    fn core(&self) -> &ProjectionCore {
        &self.core
    }

    fn accept_member(&self, member: &GridMember) -> bool {
        if !self.matches_priority(member) {
            return false;
        }
        self.core.try_add(member, |members, data| {
            let classification = classify(members, data);
            classification.host_has_room(member.host(), data)
                || member
                    .rack()
                    .is_some_and(|rack| classification.rack_has_room(rack, data))
                || classification.any_has_room(data)
        })
    }

    fn satisfy_state(&self) -> SatisfyStateData {
        let (members, data) = self.core.snapshot();
        compute_satisfy_state(&members, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amgrid_core::ContainerId;

    #[test]
    fn accepts_until_quotas_are_full() {
        let projection = DefaultGridProjection::new(ProjectionData::with_any(1).host("h1", 1));

        assert!(projection.accept_member(&GridMember::new("c1", "h1")));
        // h1 full, any pool still open.
        assert!(projection.accept_member(&GridMember::new("c2", "h2")));
        assert!(!projection.accept_member(&GridMember::new("c3", "h3")));
        assert!(!projection.accept_member(&GridMember::new("c4", "h1")));

        assert_eq!(projection.members().len(), 2);
        assert!(projection.satisfy_state().is_satisfied());
    }

    #[test]
    fn rack_room_admits_member() {
        let projection = DefaultGridProjection::new(ProjectionData::default().rack("/r1", 1));
        assert!(!projection.accept_member(&GridMember::new("c1", "h1")));
        assert!(projection.accept_member(&GridMember::new("c2", "h1").with_rack("/r1")));
        assert!(!projection.accept_member(&GridMember::new("c3", "h2").with_rack("/r1")));
    }

    #[test]
    fn priority_mismatch_is_rejected() {
        let projection = DefaultGridProjection::new(ProjectionData::with_any(5).priority(1));
        assert!(!projection.accept_member(&GridMember::new("c1", "h1").with_priority(2)));
        assert!(projection.accept_member(&GridMember::new("c2", "h1").with_priority(1)));
        assert!(projection.accept_member(&GridMember::new("c3", "h1")));
    }

    #[test]
    fn shrinking_data_produces_removals() {
        let projection = DefaultGridProjection::new(ProjectionData::with_any(3));
        for id in ["c1", "c2", "c3"] {
            assert!(projection.accept_member(&GridMember::new(id, "h1")));
        }

        projection.set_projection_data(ProjectionData::with_any(1));
        let state = projection.satisfy_state();
        assert_eq!(state.allocate_data.any, 0);
        assert_eq!(state.remove_ids(), vec![ContainerId::from("c1"), ContainerId::from("c2")]);
    }

    #[test]
    fn remove_member_is_idempotent() {
        let projection = DefaultGridProjection::new(ProjectionData::with_any(1));
        projection.accept_member(&GridMember::new("c1", "h1"));
        assert!(projection.remove_member(&"c1".into()).is_some());
        assert!(projection.remove_member(&"c1".into()).is_none());
        assert_eq!(projection.satisfy_state().allocate_data.any, 1);
    }
}
