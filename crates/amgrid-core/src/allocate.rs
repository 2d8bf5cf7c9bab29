//! Allocation requests derived from a satisfy computation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Additional containers still needed, split by dimension.
///
/// Host and rack entries are kept even when their count is zero so callers
/// can see every dimension the projection declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerAllocateData {
    /// Allocation group this request belongs to (the cluster definition id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Request priority the granted containers should carry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    pub any: u32,
    pub hosts: BTreeMap<String, u32>,
    pub racks: BTreeMap<String, u32>,
}

impl ContainerAllocateData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_priority(mut self, priority: Option<u32>) -> Self {
        self.priority = priority;
        self
    }

    pub fn add_any(&mut self, count: u32) {
        self.any = self.any.saturating_add(count);
    }

    pub fn add_hosts(&mut self, host: impl Into<String>, count: u32) {
        let entry = self.hosts.entry(host.into()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    pub fn add_racks(&mut self, rack: impl Into<String>, count: u32) {
        let entry = self.racks.entry(rack.into()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    /// True if at least one container is requested.
    pub fn has_data(&self) -> bool {
        self.total() > 0
    }

    /// Sum of all requested containers.
    pub fn total(&self) -> u64 {
        u64::from(self.any)
            + self.hosts.values().map(|c| u64::from(*c)).sum::<u64>()
            + self.racks.values().map(|c| u64::from(*c)).sum::<u64>()
    }

    pub fn by_any(&self) -> Self {
        Self {
            id: self.id.clone(),
            priority: self.priority,
            any: self.any,
            ..Self::default()
        }
    }

    pub fn by_hosts(&self) -> Self {
        Self {
            id: self.id.clone(),
            priority: self.priority,
            hosts: self.hosts.clone(),
            ..Self::default()
        }
    }

    pub fn by_racks(&self) -> Self {
        Self {
            id: self.id.clone(),
            priority: self.priority,
            racks: self.racks.clone(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_entries_do_not_count_as_data() {
        let mut data = ContainerAllocateData::new();
        data.add_hosts("h1", 0);
        data.add_racks("/r1", 0);
        assert!(!data.has_data());
        assert_eq!(data.hosts.len(), 1);
    }

    #[test]
    fn adds_accumulate() {
        let mut data = ContainerAllocateData::new();
        data.add_any(1);
        data.add_any(2);
        data.add_hosts("h1", 1);
        data.add_hosts("h1", 1);
        assert_eq!(data.any, 3);
        assert_eq!(data.hosts["h1"], 2);
        assert_eq!(data.total(), 5);
    }

    #[test]
    fn split_views_keep_one_dimension() {
        let mut data = ContainerAllocateData::new().with_id("web").with_priority(Some(3));
        data.add_any(2);
        data.add_hosts("h1", 1);
        data.add_racks("/r1", 1);

        assert_eq!(data.by_any().total(), 2);
        assert_eq!(data.by_hosts().total(), 1);
        assert_eq!(data.by_racks().racks["/r1"], 1);
        assert_eq!(data.by_racks().id.as_deref(), Some("web"));
        assert_eq!(data.by_hosts().priority, Some(3));
    }
}
