//! amgrid.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::projection::ProjectionData;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmgridConfig {
    #[serde(default)]
    pub appmaster: AppmasterConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Cluster blueprints keyed by cluster definition id.
    #[serde(default)]
    pub clusters: BTreeMap<String, ProjectionData>,
    pub simulator: Option<SimulatorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppmasterConfig {
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval: String,
}

impl Default for AppmasterConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: default_reconcile_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Host inventory for the standalone resource-manager simulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Host → rack mapping.
    #[serde(default)]
    pub racks: BTreeMap<String, String>,
}

fn default_reconcile_interval() -> String {
    "5s".to_string()
}

fn default_port() -> u16 {
    8080
}

impl AmgridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: AmgridConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn reconcile_interval(&self) -> Duration {
        parse_duration(&self.appmaster.reconcile_interval)
    }

    /// Scaffold a config with one `default` cluster and a small simulator.
    pub fn scaffold(cluster_id: &str) -> Self {
        let mut clusters = BTreeMap::new();
        clusters.insert(
            cluster_id.to_string(),
            ProjectionData::with_any(2)
                .projection_type("default")
                .priority(1)
                .host("node1", 1),
        );

        let mut racks = BTreeMap::new();
        racks.insert("node1".to_string(), "/rack1".to_string());
        racks.insert("node2".to_string(), "/rack1".to_string());
        racks.insert("node3".to_string(), "/rack2".to_string());

        AmgridConfig {
            appmaster: AppmasterConfig::default(),
            api: ApiConfig::default(),
            clusters,
            simulator: Some(SimulatorConfig {
                hosts: vec!["node1".into(), "node2".into(), "node3".into()],
                racks,
            }),
        }
    }
}

/// Parse a duration string like "500ms", "5s" or "1m".
///
/// Unparseable, zero or overflowing input falls back to five seconds.
pub fn parse_duration(s: &str) -> Duration {
    let fallback = Duration::from_secs(5);
    let s = s.trim();
    let parsed = if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    };
    parsed.filter(|d| !d.is_zero()).unwrap_or(fallback)
}
