//! amgrid-api — REST management surface for container clusters.
//!
//! Thin axum layer over [`ClusterManager`]. Request and response bodies use
//! camelCase field names.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/clusters` | List cluster ids |
//! | POST | `/api/v1/clusters` | Create a cluster |
//! | GET | `/api/v1/clusters/{id}` | Cluster resource view |
//! | PUT | `/api/v1/clusters/{id}` | Start or stop (`{"action": ...}`) |
//! | PATCH | `/api/v1/clusters/{id}` | Replace projection data |
//! | DELETE | `/api/v1/clusters/{id}` | Destroy a cluster |
//! | GET | `/api/v1/monitor` | Container monitor counts, live total and progress |

pub mod handlers;

use std::sync::Arc;

use amgrid_cluster::ClusterManager;
use axum::Router;
use axum::routing::get;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<ClusterManager>,
}

/// Build the complete API router.
pub fn build_router(manager: Arc<ClusterManager>) -> Router {
    let api_state = ApiState { manager };

    let api_routes = Router::new()
        .route("/clusters", get(handlers::list_clusters).post(handlers::create_cluster))
        .route(
            "/clusters/{id}",
            get(handlers::get_cluster)
                .put(handlers::cluster_action)
                .patch(handlers::modify_cluster)
                .delete(handlers::destroy_cluster),
        )
        .route("/monitor", get(handlers::get_monitor))
        .with_state(api_state);

    Router::new().nest("/api/v1", api_routes)
}
