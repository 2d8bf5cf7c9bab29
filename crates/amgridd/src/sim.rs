//! In-process stand-in for the YARN resource manager.
//!
//! ```text
//! ClusterManager ──allocate/release──► SimulatedResourceManager
//!                                          │ (unbounded mpsc)
//!                                          ▼
//!                                      Simulator::run
//!                                          │ grant / complete
//!        on_container_allocated ◄──────────┤
//!        on_container_launched  ◄──────────┤
//!        on_container_completed ◄──────────┘
//! ```
//!
//! Every request is granted in full. Host requests land on the named host,
//! rack requests on a configured host in that rack, and `any` requests are
//! spread round-robin over the inventory.

use std::collections::BTreeMap;
use std::sync::Arc;

use amgrid_cluster::{ClusterManager, ContainerAllocator};
use amgrid_core::config::SimulatorConfig;
use amgrid_core::{Container, ContainerAllocateData, ContainerId, ContainerStatus, exit_status};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// A call made by the application master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RmRequest {
    Allocate(ContainerAllocateData),
    Release(Vec<ContainerId>),
}

/// `ContainerAllocator` that forwards calls to a [`Simulator`] task.
pub struct SimulatedResourceManager {
    tx: mpsc::UnboundedSender<RmRequest>,
}

impl SimulatedResourceManager {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RmRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ContainerAllocator for SimulatedResourceManager {
    fn allocate(&self, request: &ContainerAllocateData) -> anyhow::Result<()> {
        self.tx
            .send(RmRequest::Allocate(request.clone()))
            .map_err(|_| anyhow::anyhow!("resource manager simulator has stopped"))
    }

    fn release(&self, ids: &[ContainerId]) -> anyhow::Result<()> {
        self.tx
            .send(RmRequest::Release(ids.to_vec()))
            .map_err(|_| anyhow::anyhow!("resource manager simulator has stopped"))
    }
}

pub struct Simulator {
    hosts: Vec<String>,
    racks: BTreeMap<String, String>,
    next_id: u64,
    cursor: usize,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let hosts = if config.hosts.is_empty() {
            vec!["localhost".to_string()]
        } else {
            config.hosts
        };
        Self {
            hosts,
            racks: config.racks,
            next_id: 0,
            cursor: 0,
        }
    }

    /// Containers satisfying `request` in full, host requests first, then
    /// rack requests, then `any`.
    pub fn grant(&mut self, request: &ContainerAllocateData) -> Vec<Container> {
        let mut granted = self.grant_hosts(&request.by_hosts());
        granted.extend(self.grant_racks(&request.by_racks()));
        granted.extend(self.grant_any(&request.by_any()));
        granted
    }

    fn grant_hosts(&mut self, request: &ContainerAllocateData) -> Vec<Container> {
        let mut granted = Vec::new();
        for (host, count) in &request.hosts {
            for _ in 0..*count {
                granted.push(self.container(host.clone(), request.priority));
            }
        }
        granted
    }

    fn grant_racks(&mut self, request: &ContainerAllocateData) -> Vec<Container> {
        let mut granted = Vec::new();
        for (rack, count) in &request.racks {
            for _ in 0..*count {
                let host = self.host_in_rack(rack);
                granted.push(self.container(host, request.priority).with_rack(rack.clone()));
            }
        }
        granted
    }

    fn grant_any(&mut self, request: &ContainerAllocateData) -> Vec<Container> {
        (0..request.any)
            .map(|_| {
                let host = self.next_host();
                self.container(host, request.priority)
            })
            .collect()
    }

    /// Completion reports for containers the application master released.
    pub fn complete(&self, ids: &[ContainerId]) -> Vec<ContainerStatus> {
        ids.iter()
            .map(|id| {
                ContainerStatus::complete(id.clone(), exit_status::KILLED_BY_APPMASTER)
                    .with_diagnostics("released by application master")
            })
            .collect()
    }

    /// Serve requests until `shutdown` fires or every sender is gone.
    pub async fn run(
        mut self,
        manager: Arc<ClusterManager>,
        mut requests: mpsc::UnboundedReceiver<RmRequest>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(hosts = self.hosts.len(), "resource manager simulator started");
        loop {
            tokio::select! {
                request = requests.recv() => {
                    match request {
                        Some(request) => self.handle(&manager, request),
                        None => break,
                    }
                }
                _ = shutdown.changed() => {
                    info!("resource manager simulator shutting down");
                    break;
                }
            }
        }
    }

    fn handle(&mut self, manager: &ClusterManager, request: RmRequest) {
        match request {
            RmRequest::Allocate(data) => {
                let granted = self.grant(&data);
                debug!(
                    group = data.id.as_deref().unwrap_or("-"),
                    count = granted.len(),
                    "granting containers"
                );
                manager.on_container_allocated(&granted);
                manager.on_container_launched(&granted);
            }
            RmRequest::Release(ids) => {
                debug!(count = ids.len(), "completing released containers");
                manager.on_container_completed(&self.complete(&ids));
            }
        }
    }

    fn container(&mut self, host: String, priority: Option<u32>) -> Container {
        self.next_id += 1;
        let id = format!("container_sim_{:06}", self.next_id);
        let mut container = Container::new(id, host.clone());
        if let Some(rack) = self.racks.get(&host) {
            container = container.with_rack(rack.clone());
        }
        match priority {
            Some(priority) => container.with_priority(priority),
            None => container,
        }
    }

    fn next_host(&mut self) -> String {
        let host = self.hosts[self.cursor % self.hosts.len()].clone();
        self.cursor += 1;
        host
    }

    fn host_in_rack(&mut self, rack: &str) -> String {
        let candidates: Vec<&String> = self
            .hosts
            .iter()
            .filter(|h| self.racks.get(*h).is_some_and(|r| r == rack))
            .collect();
        if candidates.is_empty() {
            return self.next_host();
        }
        let host = candidates[self.cursor % candidates.len()].clone();
        self.cursor += 1;
        host
    }
}
