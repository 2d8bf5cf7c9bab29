//! The satisfy algorithm.
//!
//! Pure functions over a member snapshot and a `ProjectionData` snapshot.
//! Nothing here touches shared state, so a satisfy computation can never
//! observe a half-applied `set_projection_data`.
//!
//! ```text
//! members (insertion order)
//!   │
//!   ├── host quotas   claim newest members on each declared host
//!   ├── rack quotas   claim newest unclaimed members on each declared rack
//!   ├── any pool      claims newest of whatever is still unclaimed
//!   └── surplus       everything left, oldest first ──► remove_data
//! ```

use std::collections::BTreeMap;

use amgrid_core::{ContainerAllocateData, GridMember, ProjectionData, SatisfyStateData};

/// How a member snapshot is split across the dimensions of a projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Members counted against each declared host quota.
    pub hosts: BTreeMap<String, Vec<GridMember>>,
    /// Members counted against each declared rack quota.
    pub racks: BTreeMap<String, Vec<GridMember>>,
    /// Members counted against the any pool.
    pub any: Vec<GridMember>,
    /// Members not needed by any quota, in insertion order.
    pub surplus: Vec<GridMember>,
}

impl Classification {
    /// Remaining deficit per dimension. Declared hosts and racks always get
    /// an entry, zero when the quota is met.
    pub fn allocate_data(&self, data: &ProjectionData) -> ContainerAllocateData {
        let mut allocate = ContainerAllocateData::new();
        for (host, desired) in &data.hosts {
            let claimed = self.hosts.get(host).map_or(0, Vec::len);
            allocate.add_hosts(host.clone(), deficit(*desired, claimed));
        }
        for (rack, desired) in &data.racks {
            let claimed = self.racks.get(rack).map_or(0, Vec::len);
            allocate.add_racks(rack.clone(), deficit(*desired, claimed));
        }
        allocate.add_any(deficit(data.any, self.any.len()));
        allocate
    }

    pub fn host_has_room(&self, host: &str, data: &ProjectionData) -> bool {
        data.hosts
            .get(host)
            .is_some_and(|desired| deficit(*desired, self.hosts.get(host).map_or(0, Vec::len)) > 0)
    }

    pub fn rack_has_room(&self, rack: &str, data: &ProjectionData) -> bool {
        data.racks
            .get(rack)
            .is_some_and(|desired| deficit(*desired, self.racks.get(rack).map_or(0, Vec::len)) > 0)
    }

    pub fn any_has_room(&self, data: &ProjectionData) -> bool {
        deficit(data.any, self.any.len()) > 0
    }
}

/// Split `members` between the quotas declared in `data`.
///
/// Within every bucket the newest members are kept, so the oldest member
/// beyond a quota is the first one to fall through to the next dimension
/// and, eventually, to the surplus. `members` must be in insertion order
/// and free of duplicate ids.
pub fn classify(members: &[GridMember], data: &ProjectionData) -> Classification {
    let mut unclaimed = vec![true; members.len()];

    let hosts = data
        .hosts
        .iter()
        .map(|(host, desired)| {
            let claimed = claim_newest(members, &mut unclaimed, *desired, |m| m.host() == host);
            (host.clone(), claimed)
        })
        .collect();

    let racks = data
        .racks
        .iter()
        .map(|(rack, desired)| {
            let claimed =
                claim_newest(members, &mut unclaimed, *desired, |m| m.rack() == Some(rack.as_str()));
            (rack.clone(), claimed)
        })
        .collect();

    let any = claim_newest(members, &mut unclaimed, data.any, |_| true);

    let surplus = members
        .iter()
        .zip(&unclaimed)
        .filter(|(_, free)| **free)
        .map(|(m, _)| m.clone())
        .collect();

    Classification {
        hosts,
        racks,
        any,
        surplus,
    }
}

/// Compute the diff between `data` and `members`.
pub fn compute_satisfy_state(members: &[GridMember], data: &ProjectionData) -> SatisfyStateData {
    let classification = classify(members, data);
    let allocate_data = classification.allocate_data(data);
    SatisfyStateData::new(allocate_data, classification.surplus)
}

fn claim_newest(
    members: &[GridMember],
    unclaimed: &mut [bool],
    desired: u32,
    matches: impl Fn(&GridMember) -> bool,
) -> Vec<GridMember> {
    let limit = usize::try_from(desired).unwrap_or(usize::MAX);
    let mut claimed = Vec::new();
    for (idx, member) in members.iter().enumerate().rev() {
        if claimed.len() >= limit {
            break;
        }
        if unclaimed[idx] && matches(member) {
            unclaimed[idx] = false;
            claimed.push(member.clone());
        }
    }
    claimed.reverse();
    claimed
}

fn deficit(desired: u32, claimed: usize) -> u32 {
    desired.saturating_sub(u32::try_from(claimed).unwrap_or(u32::MAX))
}
