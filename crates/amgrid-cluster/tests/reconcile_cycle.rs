//! Full satisfy/allocate cycles against a scripted resource manager.

use std::sync::{Arc, Mutex};

use amgrid_cluster::{ClusterManager, ClusterState, ContainerAllocator, CreateClusterRequest};
use amgrid_core::{Container, ContainerAllocateData, ContainerId, ContainerStatus, ProjectionData, exit_status};

/// Grants every request on the next `deliver()` call.
#[derive(Default)]
struct ScriptedRm {
    requests: Mutex<Vec<ContainerAllocateData>>,
    released: Mutex<Vec<ContainerId>>,
    next_id: Mutex<u32>,
}

impl ContainerAllocator for ScriptedRm {
    fn allocate(&self, request: &ContainerAllocateData) -> anyhow::Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    fn release(&self, ids: &[ContainerId]) -> anyhow::Result<()> {
        self.released.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }
}

impl ScriptedRm {
    fn container(&self, host: &str, rack: &str, priority: Option<u32>) -> Container {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let container = Container::new(format!("container_{:04}", *next), host).with_rack(rack);
        match priority {
            Some(p) => container.with_priority(p),
            None => container,
        }
    }

    /// Turn pending requests into containers.
    fn deliver(&self, manager: &ClusterManager) {
        let requests: Vec<_> = self.requests.lock().unwrap().drain(..).collect();
        for request in requests {
            let mut granted = Vec::new();
            for (host, count) in &request.hosts {
                for _ in 0..*count {
                    granted.push(self.container(host, "/rack-a", request.priority));
                }
            }
            for (rack, count) in &request.racks {
                for _ in 0..*count {
                    granted.push(self.container("rack-host", rack, request.priority));
                }
            }
            for _ in 0..request.any {
                granted.push(self.container("any-host", "/rack-z", request.priority));
            }
            manager.on_container_allocated(&granted);
            manager.on_container_launched(&granted);
        }
    }

    /// Report every released container as completed.
    fn complete_released(&self, manager: &ClusterManager) {
        let released: Vec<_> = self.released.lock().unwrap().drain(..).collect();
        let statuses: Vec<_> = released
            .into_iter()
            .map(|id| ContainerStatus::complete(id, exit_status::KILLED_BY_APPMASTER))
            .collect();
        manager.on_container_completed(&statuses);
    }
}

#[test]
fn cluster_converges_on_host_rack_and_any_targets() {
    let rm = Arc::new(ScriptedRm::default());
    let manager = ClusterManager::new(rm.clone());
    manager
        .create_cluster(
            CreateClusterRequest::new("web")
                .projection_type("default")
                .projection_data(ProjectionData::with_any(2).host("node1", 1).rack("/rack-b", 1)),
        )
        .unwrap();
    manager.start_cluster("web").unwrap();

    rm.deliver(&manager);
    manager.reconcile();
    rm.deliver(&manager);

    let cluster = manager.cluster("web").unwrap();
    assert!(cluster.satisfy().unwrap().is_satisfied());
    assert_eq!(cluster.projection().members().len(), 4);
    assert_eq!(manager.monitor().running_count(), 4);
    assert!(rm.released.lock().unwrap().is_empty());
}

#[test]
fn scale_down_then_stop_releases_everything() {
    let rm = Arc::new(ScriptedRm::default());
    let manager = ClusterManager::new(rm.clone());
    manager
        .create_cluster(
            CreateClusterRequest::new("workers")
                .projection_type("any")
                .projection_data(ProjectionData::with_any(4)),
        )
        .unwrap();
    manager.start_cluster("workers").unwrap();
    rm.deliver(&manager);
    assert_eq!(manager.grid().len(), 4);

    manager
        .modify_cluster("workers", ProjectionData::with_any(1))
        .unwrap();
    assert_eq!(rm.released.lock().unwrap().len(), 3);
    rm.complete_released(&manager);
    assert_eq!(manager.grid().len(), 1);

    manager.stop_cluster("workers").unwrap();
    rm.complete_released(&manager);

    let cluster = manager.cluster("workers").unwrap();
    assert_eq!(cluster.state(), ClusterState::Stopped);
    assert!(manager.grid().is_empty());
    assert_eq!(manager.monitor().failed_count(), 0);
    assert_eq!(manager.monitor().completed_count(), 0);

    // A stopped cluster can be started again and asks for its full target.
    manager.start_cluster("workers").unwrap();
    rm.deliver(&manager);
    assert_eq!(manager.grid().len(), 1);
}

#[test]
fn clusters_with_distinct_priorities_share_the_grid() {
    let rm = Arc::new(ScriptedRm::default());
    let manager = ClusterManager::new(rm.clone());
    for (id, priority, any) in [("frontend", 1, 2), ("backend", 2, 3)] {
        manager
            .create_cluster(
                CreateClusterRequest::new(id)
                    .projection_type("any")
                    .projection_data(ProjectionData::with_any(any).priority(priority)),
            )
            .unwrap();
        manager.start_cluster(id).unwrap();
    }
    rm.deliver(&manager);
    manager.reconcile();

    assert_eq!(manager.cluster("frontend").unwrap().projection().members().len(), 2);
    assert_eq!(manager.cluster("backend").unwrap().projection().members().len(), 3);
    assert!(rm.released.lock().unwrap().is_empty());

    manager.destroy_cluster("frontend").unwrap();
    assert_eq!(manager.grid().len(), 3);
    assert_eq!(rm.released.lock().unwrap().len(), 2);
}
