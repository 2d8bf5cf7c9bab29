//! ClusterManager — the application-master coordinator.
//!
//! Owns the shared grid and every container cluster on it. Lifecycle calls
//! arrive from the management surface, resource-manager events from the
//! RM client, and `reconcile()` turns the current satisfy diffs into
//! allocate and release calls on the [`ContainerAllocator`].
//!
//! The clusters map lock is never held while calling into the grid: grid
//! listeners take that lock themselves.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use amgrid_core::{
    Container, ContainerId, ContainerState, ContainerStatus, GridMember, ProjectionData,
};
use amgrid_grid::{
    Grid, GridProjection, GridProjectionFactoryLocator, ProjectedGrid, ProjectedGridListener,
};
use amgrid_monitor::ContainerMonitor;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::allocator::ContainerAllocator;
use crate::cluster::{ClusterView, ContainerCluster};
use crate::error::{ClusterError, ClusterResult};
use crate::state::ClusterState;
use crate::tracker::AllocationTracker;

/// Parameters for [`ClusterManager::create_cluster`].
#[derive(Debug, Clone, Default)]
pub struct CreateClusterRequest {
    pub cluster_id: String,
    /// Blueprint to start from, by id.
    pub cluster_def: Option<String>,
    /// Projection type; falls back to the type in the projection data.
    pub projection_type: Option<String>,
    /// Layered on top of the blueprint when both are present.
    pub projection_data: Option<ProjectionData>,
    pub extra_properties: BTreeMap<String, serde_json::Value>,
}

impl CreateClusterRequest {
    pub fn new(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            ..Self::default()
        }
    }

    pub fn cluster_def(mut self, cluster_def: impl Into<String>) -> Self {
        self.cluster_def = Some(cluster_def.into());
        self
    }

    pub fn projection_type(mut self, projection_type: impl Into<String>) -> Self {
        self.projection_type = Some(projection_type.into());
        self
    }

    pub fn projection_data(mut self, data: ProjectionData) -> Self {
        self.projection_data = Some(data);
        self
    }
}

struct ClusterEntry {
    cluster: Arc<ContainerCluster>,
    tracker: Mutex<AllocationTracker>,
}

impl ClusterEntry {
    fn tracker(&self) -> std::sync::MutexGuard<'_, AllocationTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type Clusters = Arc<RwLock<BTreeMap<String, Arc<ClusterEntry>>>>;

/// Containers on their way out.
#[derive(Default)]
struct KillQueue {
    /// Waiting for the next flush.
    queued: Vec<ContainerId>,
    /// Release sent, completion not seen yet.
    pending: HashSet<ContainerId>,
}

/// Settles stopping clusters as their members leave the grid.
struct StopSettler {
    clusters: Clusters,
}

impl ProjectedGridListener for StopSettler {
    fn member_removed(
        &self,
        projection: &Arc<dyn GridProjection>,
        _member: &GridMember,
    ) -> anyhow::Result<()> {
        let owner = self
            .clusters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|e| Arc::ptr_eq(e.cluster.projection(), projection))
            .map(|e| e.cluster.clone());
        if let Some(cluster) = owner {
            cluster.on_member_removed();
        }
        Ok(())
    }
}

pub struct ClusterManager {
    projected: ProjectedGrid,
    monitor: Arc<ContainerMonitor>,
    locator: GridProjectionFactoryLocator,
    allocator: Arc<dyn ContainerAllocator>,
    blueprints: BTreeMap<String, ProjectionData>,
    clusters: Clusters,
    kills: Mutex<KillQueue>,
}

impl ClusterManager {
    /// Manager over a fresh grid with the built-in projection types.
    pub fn new(allocator: Arc<dyn ContainerAllocator>) -> Self {
        let clusters: Clusters = Arc::new(RwLock::new(BTreeMap::new()));
        let projected = ProjectedGrid::new(Arc::new(Grid::new()));
        projected.add_projected_grid_listener(Arc::new(StopSettler {
            clusters: clusters.clone(),
        }));
        Self {
            projected,
            monitor: Arc::new(ContainerMonitor::default()),
            locator: GridProjectionFactoryLocator::with_defaults(),
            allocator,
            blueprints: BTreeMap::new(),
            clusters,
            kills: Mutex::new(KillQueue::default()),
        }
    }

    /// Cluster blueprints, keyed by cluster definition id.
    pub fn with_blueprints(mut self, blueprints: BTreeMap<String, ProjectionData>) -> Self {
        self.blueprints = blueprints;
        self
    }

    pub fn grid(&self) -> &Arc<Grid> {
        self.projected.grid()
    }

    pub fn projected_grid(&self) -> &ProjectedGrid {
        &self.projected
    }

    pub fn monitor(&self) -> &Arc<ContainerMonitor> {
        &self.monitor
    }

    pub fn registered_projection_types(&self) -> Vec<String> {
        self.locator.registered_projection_types()
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Create a cluster in `INITIAL`.
    ///
    /// The projection data is the blueprint named by `cluster_def` merged
    /// with the request data. A destroyed cluster id may be reused.
    pub fn create_cluster(&self, request: CreateClusterRequest) -> ClusterResult<Arc<ContainerCluster>> {
        let id = request.cluster_id;
        let blueprint = match &request.cluster_def {
            Some(def) => Some(
                self.blueprints
                    .get(def)
                    .ok_or_else(|| ClusterError::UnknownClusterDef(def.clone()))?,
            ),
            None => None,
        };
        let mut data = match (blueprint, request.projection_data) {
            (Some(base), Some(over)) => base.merge(&over),
            (Some(base), None) => base.clone(),
            (None, Some(data)) => data,
            (None, None) => ProjectionData::default(),
        };
        let projection_type = request
            .projection_type
            .or_else(|| data.projection_type.clone())
            .ok_or_else(|| ClusterError::MissingProjectionType(id.clone()))?
            .to_lowercase();
        data.projection_type = Some(projection_type.clone());

        if self.is_live(&id) {
            return Err(ClusterError::ClusterExists(id));
        }

        let projection = self.locator.grid_projection(&projection_type, data)?;
        let cluster = Arc::new(
            ContainerCluster::new(id.clone(), projection.clone())
                .with_cluster_def(request.cluster_def)
                .with_extra_properties(request.extra_properties),
        );
        let entry = Arc::new(ClusterEntry {
            cluster: cluster.clone(),
            tracker: Mutex::new(AllocationTracker::new()),
        });

        let replaced = {
            let mut clusters = self.clusters.write().unwrap_or_else(PoisonError::into_inner);
            if clusters
                .get(&id)
                .is_some_and(|e| e.cluster.state() != ClusterState::Destroyed)
            {
                return Err(ClusterError::ClusterExists(id));
            }
            clusters.insert(id.clone(), entry)
        };
        if let Some(old) = replaced {
            self.projected.remove_projection(old.cluster.projection());
        }
        self.projected.add_projection(projection);

        info!(cluster = %id, %projection_type, "cluster created");
        Ok(cluster)
    }

    /// Start a cluster and immediately run its first reconcile pass.
    pub fn start_cluster(&self, id: &str) -> ClusterResult<()> {
        let entry = self.entry(id)?;
        entry.cluster.start()?;
        entry.tracker().clear();
        self.reconcile_entry(&entry);
        self.flush_kills();
        Ok(())
    }

    /// Stop a cluster, releasing every member it holds.
    pub fn stop_cluster(&self, id: &str) -> ClusterResult<()> {
        let entry = self.entry(id)?;
        let members = entry.cluster.stop()?;
        entry.tracker().clear();
        for member in &members {
            self.queue_kill(member.id());
        }
        self.flush_kills();
        Ok(())
    }

    /// Replace a running cluster's projection data and reconcile it.
    pub fn modify_cluster(&self, id: &str, data: ProjectionData) -> ClusterResult<()> {
        let entry = self.entry(id)?;
        let current = entry.cluster.projection().projection_data();
        let mut data = data;
        if data.projection_type.is_none() {
            data.projection_type = current.projection_type.clone();
        }
        entry.cluster.modify(data)?;
        entry.tracker().clear();
        self.reconcile_entry(&entry);
        self.flush_kills();
        Ok(())
    }

    /// Destroy a cluster. Its members leave the grid and are released.
    /// Destroying an already destroyed cluster does nothing.
    pub fn destroy_cluster(&self, id: &str) -> ClusterResult<()> {
        let entry = self.entry(id)?;
        let members = entry.cluster.destroy();
        entry.tracker().clear();
        self.projected.remove_projection(entry.cluster.projection());
        for member in &members {
            self.grid().remove_member(member.id());
            self.queue_kill(member.id());
        }
        self.flush_kills();
        Ok(())
    }

    pub fn cluster(&self, id: &str) -> Option<Arc<ContainerCluster>> {
        self.clusters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|e| e.cluster.clone())
    }

    pub fn cluster_ids(&self) -> Vec<String> {
        self.clusters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn view(&self, id: &str) -> ClusterResult<ClusterView> {
        Ok(self.entry(id)?.cluster.view())
    }

    /// Create and start every blueprint that names a projection type.
    /// Returns the ids that were started; failures are logged.
    pub fn start_configured_clusters(&self) -> Vec<String> {
        let mut started = Vec::new();
        for (id, blueprint) in &self.blueprints {
            if blueprint.projection_type.is_none() {
                debug!(cluster_def = %id, "blueprint without projection type, not auto-starting");
                continue;
            }
            let request = CreateClusterRequest::new(id.clone()).cluster_def(id.clone());
            let result = self
                .create_cluster(request)
                .and_then(|_| self.start_cluster(id));
            match result {
                Ok(()) => started.push(id.clone()),
                Err(e) => error!(cluster = %id, error = %e, "failed to start configured cluster"),
            }
        }
        started
    }

    // ── Resource-manager events ────────────────────────────────────

    /// Containers granted by the resource manager.
    ///
    /// Each one joins the grid; a container no projection accepts is
    /// released right away.
    pub fn on_container_allocated(&self, containers: &[Container]) {
        self.monitor.on_container(containers);
        for container in containers {
            let member = container.to_member();
            match self.grid().add_member(member.clone()) {
                Ok(true) => {
                    if let Some(entry) = self.owner_entry(member.id()) {
                        entry.tracker().on_allocated(&member);
                        info!(
                            container = %member.id(),
                            host = member.host(),
                            cluster = entry.cluster.id(),
                            "container joined cluster"
                        );
                    }
                }
                Ok(false) => debug!(container = %member.id(), "container already in grid"),
                Err(e) => {
                    info!(container = %member.id(), reason = %e, "releasing unwanted container");
                    self.queue_kill(member.id());
                }
            }
        }
        self.flush_kills();
    }

    /// Containers the resource manager reports as launched.
    pub fn on_container_launched(&self, containers: &[Container]) {
        let statuses: Vec<ContainerStatus> = containers
            .iter()
            .map(|c| ContainerStatus::new(c.id.clone(), ContainerState::Running, 0))
            .collect();
        self.monitor.on_container_status(&statuses);
    }

    /// Completed containers leave the grid.
    pub fn on_container_completed(&self, statuses: &[ContainerStatus]) {
        for status in statuses {
            if status.state != ContainerState::Complete {
                continue;
            }
            self.kills().pending.remove(&status.container_id);
            if self.grid().remove_member(&status.container_id) {
                debug!(
                    container = %status.container_id,
                    exit_status = status.exit_status,
                    "container left grid"
                );
            }
        }
        self.monitor.on_container_status(statuses);
    }

    // ── Reconcile ──────────────────────────────────────────────────

    /// One satisfy/allocate pass over every cluster.
    pub fn reconcile(&self) {
        let entries: Vec<Arc<ClusterEntry>> = self
            .clusters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for entry in &entries {
            self.reconcile_entry(entry);
        }
        self.flush_kills();
    }

    /// Run `reconcile()` every `interval` until `shutdown` fires.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = interval.as_millis() as u64, "reconcile loop started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => self.reconcile(),
                _ = shutdown.changed() => {
                    info!("reconcile loop shutting down");
                    break;
                }
            }
        }
    }

    fn reconcile_entry(&self, entry: &ClusterEntry) {
        let cluster = &entry.cluster;
        let Some(satisfy) = cluster.satisfy() else {
            return;
        };

        for member in &satisfy.remove_data {
            self.queue_kill(member.id());
        }

        if cluster.state() != ClusterState::Running || !satisfy.allocate_data.has_data() {
            return;
        }
        let deficit = satisfy
            .allocate_data
            .clone()
            .with_id(cluster.id())
            .with_priority(cluster.projection().priority());
        let request = entry.tracker().track(&deficit);
        if !request.has_data() {
            return;
        }
        info!(
            cluster = cluster.id(),
            any = request.any,
            hosts = ?request.hosts,
            racks = ?request.racks,
            "requesting containers"
        );
        if let Err(e) = self.allocator.allocate(&request) {
            warn!(cluster = cluster.id(), error = %e, "allocation request failed");
            entry.tracker().clear();
        }
    }

    // ── Internals ──────────────────────────────────────────────────

    fn entry(&self, id: &str) -> ClusterResult<Arc<ClusterEntry>> {
        self.clusters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| ClusterError::NoSuchCluster(id.to_string()))
    }

    fn is_live(&self, id: &str) -> bool {
        self.cluster(id)
            .is_some_and(|c| c.state() != ClusterState::Destroyed)
    }

    fn owner_entry(&self, id: &ContainerId) -> Option<Arc<ClusterEntry>> {
        let projection = self.projected.projection_of(id)?;
        self.clusters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|e| Arc::ptr_eq(e.cluster.projection(), &projection))
            .cloned()
    }

    fn kills(&self) -> std::sync::MutexGuard<'_, KillQueue> {
        self.kills.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn queue_kill(&self, id: &ContainerId) {
        let mut kills = self.kills();
        if kills.pending.contains(id) || kills.queued.contains(id) {
            return;
        }
        kills.queued.push(id.clone());
    }

    fn flush_kills(&self) {
        let ids = {
            let mut kills = self.kills();
            let ids = std::mem::take(&mut kills.queued);
            kills.pending.extend(ids.iter().cloned());
            ids
        };
        if ids.is_empty() {
            return;
        }
        info!(count = ids.len(), "releasing containers");
        if let Err(e) = self.allocator.release(&ids) {
            warn!(error = %e, "container release failed, will retry");
            let mut kills = self.kills();
            for id in &ids {
                kills.pending.remove(id);
            }
            kills.queued.extend(ids);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amgrid_core::{ContainerAllocateData, exit_status};

    #[derive(Default)]
    struct Recording {
        allocations: Mutex<Vec<ContainerAllocateData>>,
        releases: Mutex<Vec<ContainerId>>,
    }

    impl ContainerAllocator for Recording {
        fn allocate(&self, request: &ContainerAllocateData) -> anyhow::Result<()> {
            self.allocations.lock().unwrap().push(request.clone());
            Ok(())
        }

        fn release(&self, ids: &[ContainerId]) -> anyhow::Result<()> {
            self.releases.lock().unwrap().extend(ids.iter().cloned());
            Ok(())
        }
    }

    fn manager() -> (ClusterManager, Arc<Recording>) {
        let recording = Arc::new(Recording::default());
        (ClusterManager::new(recording.clone()), recording)
    }

    fn any_cluster(id: &str, any: u32) -> CreateClusterRequest {
        CreateClusterRequest::new(id)
            .projection_type("any")
            .projection_data(ProjectionData::with_any(any))
    }

    #[test]
    fn create_requires_projection_type() {
        let (manager, _) = manager();
        let err = manager
            .create_cluster(CreateClusterRequest::new("web").projection_data(ProjectionData::with_any(1)))
            .err()
            .unwrap();
        assert!(matches!(err, ClusterError::MissingProjectionType(_)));
    }

    #[test]
    fn create_rejects_unknown_type_and_blueprint() {
        let (manager, _) = manager();
        let err = manager
            .create_cluster(CreateClusterRequest::new("web").projection_type("spread"))
            .err()
            .unwrap();
        assert!(matches!(err, ClusterError::Grid(_)));

        let err = manager
            .create_cluster(CreateClusterRequest::new("web").cluster_def("nope"))
            .err()
            .unwrap();
        assert!(matches!(err, ClusterError::UnknownClusterDef(_)));
        assert!(manager.cluster_ids().is_empty());
    }

    #[test]
    fn create_twice_conflicts_until_destroyed() {
        let (manager, _) = manager();
        manager.create_cluster(any_cluster("web", 1)).unwrap();
        assert!(matches!(
            manager.create_cluster(any_cluster("web", 1)).err().unwrap(),
            ClusterError::ClusterExists(_)
        ));

        manager.destroy_cluster("web").unwrap();
        let again = manager.create_cluster(any_cluster("web", 2)).unwrap();
        assert_eq!(again.state(), ClusterState::Initial);
        assert_eq!(manager.projected_grid().projections().len(), 1);
    }

    #[test]
    fn blueprint_is_merged_with_request() {
        let recording = Arc::new(Recording::default());
        let mut blueprints = BTreeMap::new();
        blueprints.insert(
            "web".to_string(),
            ProjectionData::with_any(1).projection_type("default").priority(4),
        );
        let manager = ClusterManager::new(recording).with_blueprints(blueprints);

        let cluster = manager
            .create_cluster(
                CreateClusterRequest::new("web-2")
                    .cluster_def("web")
                    .projection_data(ProjectionData::with_any(3)),
            )
            .unwrap();
        assert_eq!(cluster.projection().projection_type(), "default");
        assert_eq!(cluster.projection().projection_data().any, 3);
        assert_eq!(cluster.projection().priority(), Some(4));
        assert_eq!(cluster.cluster_def(), Some("web"));
    }

    #[test]
    fn lifecycle_calls_on_unknown_cluster_fail() {
        let (manager, _) = manager();
        assert!(matches!(manager.start_cluster("x"), Err(ClusterError::NoSuchCluster(_))));
        assert!(matches!(manager.destroy_cluster("x"), Err(ClusterError::NoSuchCluster(_))));
        assert!(manager.view("x").is_err());
    }

    #[test]
    fn start_requests_deficit_once() {
        let (manager, recording) = manager();
        manager.create_cluster(any_cluster("web", 2)).unwrap();
        manager.start_cluster("web").unwrap();
        manager.reconcile();
        manager.reconcile();

        let allocations = recording.allocations.lock().unwrap().clone();
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].any, 2);
        assert_eq!(allocations[0].id.as_deref(), Some("web"));
    }

    #[test]
    fn allocated_containers_fill_cluster() {
        let (manager, recording) = manager();
        manager.create_cluster(any_cluster("web", 2)).unwrap();
        manager.start_cluster("web").unwrap();

        manager.on_container_allocated(&[Container::new("c1", "h1"), Container::new("c2", "h2")]);
        manager.reconcile();

        let cluster = manager.cluster("web").unwrap();
        assert_eq!(cluster.projection().members().len(), 2);
        assert!(cluster.satisfy().unwrap().is_satisfied());
        assert_eq!(manager.monitor().free_count(), 2);
        assert_eq!(recording.allocations.lock().unwrap().len(), 1);
        assert!(recording.releases.lock().unwrap().is_empty());
    }

    #[test]
    fn unwanted_container_is_released() {
        let (manager, recording) = manager();
        manager.on_container_allocated(&[Container::new("stray", "h1")]);

        assert!(manager.grid().is_empty());
        assert_eq!(*recording.releases.lock().unwrap(), vec![ContainerId::from("stray")]);
    }

    #[test]
    fn shrinking_releases_surplus_once() {
        let (manager, recording) = manager();
        manager.create_cluster(any_cluster("web", 3)).unwrap();
        manager.start_cluster("web").unwrap();
        manager.on_container_allocated(&[
            Container::new("c1", "h1"),
            Container::new("c2", "h1"),
            Container::new("c3", "h1"),
        ]);

        manager.modify_cluster("web", ProjectionData::with_any(1)).unwrap();
        manager.reconcile();

        let releases = recording.releases.lock().unwrap().clone();
        assert_eq!(releases, vec![ContainerId::from("c1"), ContainerId::from("c2")]);

        manager.on_container_completed(&[
            ContainerStatus::complete("c1", exit_status::KILLED_BY_APPMASTER),
            ContainerStatus::complete("c2", exit_status::KILLED_BY_APPMASTER),
        ]);
        assert_eq!(manager.grid().len(), 1);
        assert!(manager.cluster("web").unwrap().satisfy().unwrap().is_satisfied());
        assert_eq!(manager.monitor().failed_count(), 0);
    }

    #[test]
    fn stop_releases_members_then_settles() {
        let (manager, recording) = manager();
        manager.create_cluster(any_cluster("web", 1)).unwrap();
        manager.start_cluster("web").unwrap();
        manager.on_container_allocated(&[Container::new("c1", "h1")]);

        manager.stop_cluster("web").unwrap();
        let cluster = manager.cluster("web").unwrap();
        assert_eq!(cluster.state(), ClusterState::Stopping);
        assert_eq!(*recording.releases.lock().unwrap(), vec![ContainerId::from("c1")]);

        // Still stopping: the pending release is not sent again.
        manager.reconcile();
        assert_eq!(recording.releases.lock().unwrap().len(), 1);

        manager.on_container_completed(&[ContainerStatus::complete("c1", exit_status::KILLED_BY_APPMASTER)]);
        assert_eq!(cluster.state(), ClusterState::Stopped);
    }

    #[test]
    fn modify_while_stopping_leaves_cluster_stopping() {
        let (manager, _) = manager();
        manager.create_cluster(any_cluster("web", 1)).unwrap();
        manager.start_cluster("web").unwrap();
        manager.on_container_allocated(&[Container::new("c1", "h1")]);
        manager.stop_cluster("web").unwrap();

        let err = manager
            .modify_cluster("web", ProjectionData::with_any(4))
            .unwrap_err();
        assert!(matches!(err, ClusterError::InvalidTransition { .. }));
        assert_eq!(manager.cluster("web").unwrap().state(), ClusterState::Stopping);
    }

    #[test]
    fn destroy_removes_members_from_grid() {
        let (manager, recording) = manager();
        manager.create_cluster(any_cluster("web", 2)).unwrap();
        manager.start_cluster("web").unwrap();
        manager.on_container_allocated(&[Container::new("c1", "h1"), Container::new("c2", "h1")]);

        manager.destroy_cluster("web").unwrap();
        manager.destroy_cluster("web").unwrap();

        assert!(manager.grid().is_empty());
        assert!(manager.projected_grid().projections().is_empty());
        assert_eq!(manager.cluster("web").unwrap().state(), ClusterState::Destroyed);
        assert_eq!(recording.releases.lock().unwrap().len(), 2);
    }

    #[test]
    fn containers_go_to_matching_priority() {
        let (manager, _) = manager();
        manager
            .create_cluster(
                CreateClusterRequest::new("a")
                    .projection_type("any")
                    .projection_data(ProjectionData::with_any(1).priority(1)),
            )
            .unwrap();
        manager
            .create_cluster(
                CreateClusterRequest::new("b")
                    .projection_type("any")
                    .projection_data(ProjectionData::with_any(1).priority(2)),
            )
            .unwrap();
        manager.start_cluster("a").unwrap();
        manager.start_cluster("b").unwrap();

        manager.on_container_allocated(&[Container::new("c1", "h1").with_priority(2)]);
        assert!(manager.cluster("b").unwrap().projection().contains(&"c1".into()));
        assert!(manager.cluster("a").unwrap().projection().members().is_empty());
    }

    #[test]
    fn configured_clusters_start_when_typed() {
        let recording = Arc::new(Recording::default());
        let mut blueprints = BTreeMap::new();
        blueprints.insert("workers".to_string(), ProjectionData::with_any(2).projection_type("any"));
        blueprints.insert("template".to_string(), ProjectionData::with_any(1));
        let manager = ClusterManager::new(recording.clone()).with_blueprints(blueprints);

        assert_eq!(manager.start_configured_clusters(), vec!["workers".to_string()]);
        assert_eq!(manager.cluster("workers").unwrap().state(), ClusterState::Running);
        assert!(manager.cluster("template").is_none());
        assert_eq!(recording.allocations.lock().unwrap()[0].any, 2);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (manager, recording) = manager();
        let manager = Arc::new(manager);
        manager.create_cluster(any_cluster("web", 1)).unwrap();
        // Started behind the manager's back, so only the loop can request.
        manager.cluster("web").unwrap().start().unwrap();
        assert!(recording.allocations.lock().unwrap().is_empty());

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn({
            let manager = manager.clone();
            async move { manager.run(Duration::from_millis(10), rx).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(recording.allocations.lock().unwrap().len(), 1);
    }
}
