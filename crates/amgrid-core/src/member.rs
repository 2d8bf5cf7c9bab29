//! Grid members and their container identity.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque container identifier as handed out by the resource manager.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the id carries no usable characters.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContainerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single allocated container tracked by a grid.
///
/// Members are immutable once created. Identity is the container id: two
/// members with the same id are the same member regardless of the other
/// attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridMember {
    id: ContainerId,
    host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    priority: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
}

impl GridMember {
    pub fn new(id: impl Into<ContainerId>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            rack: None,
            priority: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_rack(mut self, rack: impl Into<String>) -> Self {
        self.rack = Some(rack.into());
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn rack(&self) -> Option<&str> {
        self.rack.as_deref()
    }

    pub fn priority(&self) -> Option<u32> {
        self.priority
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

impl PartialEq for GridMember {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GridMember {}

impl std::hash::Hash for GridMember {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identity_is_the_container_id() {
        let a = GridMember::new("c1", "host1").with_rack("/rack1");
        let b = GridMember::new("c1", "host2");
        assert_eq!(a, b);

        let set: HashSet<GridMember> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn builder_sets_optional_attributes() {
        let member = GridMember::new("c1", "host1")
            .with_rack("/default-rack")
            .with_priority(3)
            .with_metadata("role", "worker");

        assert_eq!(member.host(), "host1");
        assert_eq!(member.rack(), Some("/default-rack"));
        assert_eq!(member.priority(), Some(3));
        assert_eq!(member.metadata().get("role").map(String::as_str), Some("worker"));
    }

    #[test]
    fn blank_ids_are_detected() {
        assert!(ContainerId::new("  ").is_blank());
        assert!(!ContainerId::new("container_01").is_blank());
    }
}
