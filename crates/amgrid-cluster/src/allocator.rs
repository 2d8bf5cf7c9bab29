use amgrid_core::{ContainerAllocateData, ContainerId};

/// Seam to the resource manager.
///
/// Both calls are fire-and-forget from the engine's point of view: granted
/// containers come back through `ClusterManager::on_container_allocated`
/// and released ones through `on_container_completed`.
pub trait ContainerAllocator: Send + Sync {
    /// Ask for additional containers.
    fn allocate(&self, request: &ContainerAllocateData) -> anyhow::Result<()>;

    /// Give containers back.
    fn release(&self, ids: &[ContainerId]) -> anyhow::Result<()>;
}
