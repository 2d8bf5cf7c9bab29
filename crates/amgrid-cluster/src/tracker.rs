//! Outstanding allocation requests for one cluster.
//!
//! The resource manager answers requests asynchronously, so a satisfy
//! computation keeps reporting a deficit until the containers actually
//! arrive. The tracker remembers what has already been asked for so each
//! reconcile pass only requests the difference.

use std::collections::BTreeMap;

use amgrid_core::{ContainerAllocateData, GridMember};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationTracker {
    any: u32,
    hosts: BTreeMap<String, u32>,
    racks: BTreeMap<String, u32>,
}

impl AllocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn a deficit into a request, skipping what is still outstanding,
    /// and record the request as outstanding.
    pub fn track(&mut self, deficit: &ContainerAllocateData) -> ContainerAllocateData {
        let mut request = ContainerAllocateData {
            id: deficit.id.clone(),
            priority: deficit.priority,
            ..ContainerAllocateData::default()
        };

        for (host, wanted) in &deficit.hosts {
            let outstanding = self.hosts.entry(host.clone()).or_insert(0);
            let need = wanted.saturating_sub(*outstanding);
            if need > 0 {
                *outstanding += need;
                request.add_hosts(host.clone(), need);
            }
        }
        for (rack, wanted) in &deficit.racks {
            let outstanding = self.racks.entry(rack.clone()).or_insert(0);
            let need = wanted.saturating_sub(*outstanding);
            if need > 0 {
                *outstanding += need;
                request.add_racks(rack.clone(), need);
            }
        }
        let need = deficit.any.saturating_sub(self.any);
        if need > 0 {
            self.any += need;
            request.add_any(need);
        }
        request
    }

    /// Settle one outstanding request against an arrived member.
    ///
    /// Matches the member's host, then its rack, then the any pool, and
    /// finally any other outstanding request. Returns `false` if nothing
    /// was outstanding.
    pub fn on_allocated(&mut self, member: &GridMember) -> bool {
        if take(self.hosts.get_mut(member.host())) {
            return true;
        }
        if let Some(rack) = member.rack()
            && take(self.racks.get_mut(rack))
        {
            return true;
        }
        if self.any > 0 {
            self.any -= 1;
            return true;
        }
        self.hosts.values_mut().any(|count| take(Some(count)))
            || self.racks.values_mut().any(|count| take(Some(count)))
    }

    /// Forget every outstanding request.
    pub fn clear(&mut self) {
        self.any = 0;
        self.hosts.clear();
        self.racks.clear();
    }

    /// Total number of containers requested but not yet arrived.
    pub fn outstanding(&self) -> u64 {
        u64::from(self.any)
            + self.hosts.values().map(|c| u64::from(*c)).sum::<u64>()
            + self.racks.values().map(|c| u64::from(*c)).sum::<u64>()
    }
}

fn take(count: Option<&mut u32>) -> bool {
    match count {
        Some(count) if *count > 0 => {
            *count -= 1;
            true
        }
        _ => false,
    }
}
