//! REST API handlers.
//!
//! Each handler calls into the `ClusterManager` and returns a JSON
//! envelope. Lifecycle errors map onto HTTP status codes in
//! [`cluster_error`].

use std::collections::BTreeMap;

use amgrid_cluster::{ClusterError, CreateClusterRequest};
use amgrid_core::ProjectionData;
use amgrid_grid::GridError;
use amgrid_monitor::ContainerMonitorState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn cluster_error(e: ClusterError) -> Response {
    let status = match &e {
        ClusterError::NoSuchCluster(_) => StatusCode::NOT_FOUND,
        ClusterError::InvalidTransition { .. } | ClusterError::ClusterExists(_) => StatusCode::CONFLICT,
        ClusterError::UnknownClusterDef(_)
        | ClusterError::MissingProjectionType(_)
        | ClusterError::Grid(GridError::UnknownProjectionType { .. }) => StatusCode::BAD_REQUEST,
        ClusterError::Grid(GridError::Rejected { .. }) => StatusCode::CONFLICT,
    };
    warn!(error = %e, status = status.as_u16(), "cluster request failed");
    error_response(&e.to_string(), status).into_response()
}

// ── Request bodies ─────────────────────────────────────────────

/// POST /api/v1/clusters
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterBody {
    pub cluster_id: String,
    #[serde(default)]
    pub cluster_def: Option<String>,
    /// Projection type.
    #[serde(default)]
    pub projection: Option<String>,
    #[serde(default)]
    pub projection_data: Option<ProjectionData>,
    #[serde(default)]
    pub extra_properties: BTreeMap<String, serde_json::Value>,
}

impl From<CreateClusterBody> for CreateClusterRequest {
    fn from(body: CreateClusterBody) -> Self {
        CreateClusterRequest {
            cluster_id: body.cluster_id,
            cluster_def: body.cluster_def,
            projection_type: body.projection,
            projection_data: body.projection_data,
            extra_properties: body.extra_properties,
        }
    }
}

/// PUT /api/v1/clusters/{id}
#[derive(Debug, Deserialize)]
pub struct ActionBody {
    pub action: String,
}

/// PATCH /api/v1/clusters/{id}
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyBody {
    pub projection_data: ProjectionData,
}

// ── Clusters ───────────────────────────────────────────────────

/// GET /api/v1/clusters
pub async fn list_clusters(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.manager.cluster_ids()).into_response()
}

/// GET /api/v1/clusters/{id}
pub async fn get_cluster(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.manager.view(&id) {
        Ok(view) => ApiResponse::ok(view).into_response(),
        Err(e) => cluster_error(e),
    }
}

/// POST /api/v1/clusters
pub async fn create_cluster(
    State(state): State<ApiState>,
    Json(body): Json<CreateClusterBody>,
) -> impl IntoResponse {
    if body.cluster_id.trim().is_empty() {
        return error_response("clusterId must not be empty", StatusCode::BAD_REQUEST).into_response();
    }
    match state.manager.create_cluster(body.into()) {
        Ok(cluster) => {
            let location = format!("/api/v1/clusters/{}", cluster.id());
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                ApiResponse::ok(cluster.view()),
            )
                .into_response()
        }
        Err(e) => cluster_error(e),
    }
}

/// PUT /api/v1/clusters/{id}
pub async fn cluster_action(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<ActionBody>,
) -> impl IntoResponse {
    debug!(cluster = %id, action = %body.action, "cluster action requested");
    let result = match body.action.to_ascii_lowercase().as_str() {
        "start" => state.manager.start_cluster(&id),
        "stop" => state.manager.stop_cluster(&id),
        other => {
            let msg = format!("unknown action: {other}");
            return error_response(&msg, StatusCode::NOT_FOUND).into_response();
        }
    };
    match result.and_then(|()| state.manager.view(&id)) {
        Ok(view) => ApiResponse::ok(view).into_response(),
        Err(e) => cluster_error(e),
    }
}

/// PATCH /api/v1/clusters/{id}
pub async fn modify_cluster(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<ModifyBody>,
) -> impl IntoResponse {
    match state
        .manager
        .modify_cluster(&id, body.projection_data)
        .and_then(|()| state.manager.view(&id))
    {
        Ok(view) => ApiResponse::ok(view).into_response(),
        Err(e) => cluster_error(e),
    }
}

/// DELETE /api/v1/clusters/{id}
pub async fn destroy_cluster(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.manager.destroy_cluster(&id) {
        Ok(()) => ApiResponse::ok(serde_json::json!({ "destroyed": id })).into_response(),
        Err(e) => cluster_error(e),
    }
}

// ── Monitor ────────────────────────────────────────────────────

/// Monitor counts plus the derived totals.
#[derive(serde::Serialize)]
pub struct MonitorView {
    #[serde(flatten)]
    pub counts: ContainerMonitorState,
    pub live: usize,
    pub progress: f64,
}

impl From<ContainerMonitorState> for MonitorView {
    fn from(counts: ContainerMonitorState) -> Self {
        Self {
            counts,
            live: counts.live(),
            progress: counts.progress(),
        }
    }
}

/// GET /api/v1/monitor
pub async fn get_monitor(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(MonitorView::from(state.manager.monitor().state())).into_response()
}
