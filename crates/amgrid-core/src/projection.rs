//! Projection data — the declared target a projection reconciles toward.
//!
//! Counts are unsigned in memory. Configuration files and management
//! requests carry signed numbers, so deserialization goes through
//! [`ProjectionDataSpec`] and rejects negative counts before a
//! `ProjectionData` can exist.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ProjectionDataError, ProjectionDataResult};

/// Desired container counts for one projection plus request settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProjectionDataSpec")]
pub struct ProjectionData {
    /// Registered projection type name, e.g. `default` or `any`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub projection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    /// Memory per container in megabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<bool>,
    /// Containers not tied to a specific host or rack.
    pub any: u32,
    pub hosts: BTreeMap<String, u32>,
    pub racks: BTreeMap<String, u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl ProjectionData {
    /// Projection data asking for `any` containers anywhere.
    pub fn with_any(any: u32) -> Self {
        Self {
            any,
            ..Self::default()
        }
    }

    pub fn host(mut self, host: impl Into<String>, count: u32) -> Self {
        self.hosts.insert(host.into(), count);
        self
    }

    pub fn rack(mut self, rack: impl Into<String>, count: u32) -> Self {
        self.racks.insert(rack.into(), count);
        self
    }

    pub fn projection_type(mut self, projection_type: impl Into<String>) -> Self {
        self.projection_type = Some(projection_type.into());
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Copy of this data keeping only the `any` dimension.
    pub fn any_only(&self) -> Self {
        Self {
            hosts: BTreeMap::new(),
            racks: BTreeMap::new(),
            ..self.clone()
        }
    }

    /// Total number of containers this data asks for across all dimensions.
    pub fn total(&self) -> u64 {
        u64::from(self.any)
            + self.hosts.values().map(|c| u64::from(*c)).sum::<u64>()
            + self.racks.values().map(|c| u64::from(*c)).sum::<u64>()
    }

    /// Layer `other` on top of this data, returning a new instance.
    ///
    /// Optional fields set on `other` win. `any` from `other` wins only when
    /// it is non-zero. Host, rack and property maps are unioned with
    /// `other` overriding matching keys.
    pub fn merge(&self, other: &ProjectionData) -> ProjectionData {
        let mut hosts = self.hosts.clone();
        hosts.extend(other.hosts.iter().map(|(k, v)| (k.clone(), *v)));
        let mut racks = self.racks.clone();
        racks.extend(other.racks.iter().map(|(k, v)| (k.clone(), *v)));
        let mut properties = self.properties.clone();
        properties.extend(other.properties.iter().map(|(k, v)| (k.clone(), v.clone())));

        ProjectionData {
            projection_type: other
                .projection_type
                .clone()
                .or_else(|| self.projection_type.clone()),
            priority: other.priority.or(self.priority),
            memory: other.memory.or(self.memory),
            virtual_cores: other.virtual_cores.or(self.virtual_cores),
            locality: other.locality.or(self.locality),
            any: if other.any > 0 { other.any } else { self.any },
            hosts,
            racks,
            properties,
        }
    }
}

/// Wire/config form of [`ProjectionData`] with signed counts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectionDataSpec {
    #[serde(rename = "type", default)]
    pub projection_type: Option<String>,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default, alias = "virtualCores")]
    pub virtual_cores: Option<u32>,
    #[serde(default)]
    pub locality: Option<bool>,
    #[serde(default)]
    pub any: Option<i64>,
    #[serde(default)]
    pub hosts: Option<BTreeMap<String, i64>>,
    #[serde(default)]
    pub racks: Option<BTreeMap<String, i64>>,
    #[serde(default)]
    pub properties: Option<BTreeMap<String, serde_json::Value>>,
}

impl TryFrom<ProjectionDataSpec> for ProjectionData {
    type Error = ProjectionDataError;

    fn try_from(spec: ProjectionDataSpec) -> ProjectionDataResult<Self> {
        let any = match spec.any {
            Some(count) => checked_count("any", "*", count)?,
            None => 0,
        };
        let hosts = checked_counts("host", spec.hosts.unwrap_or_default())?;
        let racks = checked_counts("rack", spec.racks.unwrap_or_default())?;

        Ok(ProjectionData {
            projection_type: spec.projection_type.map(|t| t.to_lowercase()),
            priority: spec.priority,
            memory: spec.memory,
            virtual_cores: spec.virtual_cores,
            locality: spec.locality,
            any,
            hosts,
            racks,
            properties: spec.properties.unwrap_or_default(),
        })
    }
}

fn checked_count(dimension: &'static str, key: &str, count: i64) -> ProjectionDataResult<u32> {
    if count < 0 {
        return Err(ProjectionDataError::NegativeCount {
            dimension,
            key: key.to_string(),
            count,
        });
    }
    u32::try_from(count).map_err(|_| ProjectionDataError::CountOutOfRange {
        dimension,
        key: key.to_string(),
        count,
    })
}

fn checked_counts(
    dimension: &'static str,
    counts: BTreeMap<String, i64>,
) -> ProjectionDataResult<BTreeMap<String, u32>> {
    counts
        .into_iter()
        .map(|(key, count)| checked_count(dimension, &key, count).map(|c| (key, c)))
        .collect()
}
