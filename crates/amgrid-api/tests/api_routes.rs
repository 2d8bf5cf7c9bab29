//! REST surface driven through the router.

use std::sync::{Arc, Mutex};

use amgrid_api::build_router;
use amgrid_cluster::{ClusterManager, ContainerAllocator};
use amgrid_core::{Container, ContainerAllocateData, ContainerId};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

#[derive(Default)]
struct RecordingAllocator {
    requests: Mutex<Vec<ContainerAllocateData>>,
    released: Mutex<Vec<ContainerId>>,
}

impl ContainerAllocator for RecordingAllocator {
    fn allocate(&self, request: &ContainerAllocateData) -> anyhow::Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    fn release(&self, ids: &[ContainerId]) -> anyhow::Result<()> {
        self.released.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }
}

fn setup() -> (Arc<RecordingAllocator>, Arc<ClusterManager>, Router) {
    let allocator = Arc::new(RecordingAllocator::default());
    let manager = Arc::new(ClusterManager::new(allocator.clone()));
    let router = build_router(manager.clone());
    (allocator, manager, router)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_web(router: &Router) {
    let req = json_request(
        "POST",
        "/api/v1/clusters",
        json!({
            "clusterId": "web",
            "projection": "default",
            "projectionData": { "any": 2, "hosts": { "node1": 1 } },
            "extraProperties": { "owner": "ops" }
        }),
    );
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/api/v1/clusters/web"
    );
}

#[tokio::test]
async fn list_clusters_empty() {
    let (_, _, router) = setup();
    let resp = router.oneshot(get("/api/v1/clusters")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn create_then_view_uses_camel_case() {
    let (_, _, router) = setup();
    create_web(&router).await;

    let resp = router.clone().oneshot(get("/api/v1/clusters/web")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let view = body_json(resp).await["data"].clone();
    assert_eq!(view["id"], "web");
    assert_eq!(view["clusterState"], "INITIAL");
    assert_eq!(view["projection"]["type"], "default");
    assert_eq!(view["projection"]["projectionData"]["any"], 2);
    assert_eq!(view["extraProperties"]["owner"], "ops");

    let resp = router.oneshot(get("/api/v1/clusters")).await.unwrap();
    assert_eq!(body_json(resp).await["data"], json!(["web"]));
}

#[tokio::test]
async fn start_requests_containers_and_reports_deficit() {
    let (allocator, _, router) = setup();
    create_web(&router).await;

    let req = json_request("PUT", "/api/v1/clusters/web", json!({ "action": "start" }));
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let view = body_json(resp).await["data"].clone();
    assert_eq!(view["clusterState"], "RUNNING");
    assert_eq!(view["satisfyState"]["allocateData"]["any"], 2);
    assert_eq!(view["satisfyState"]["allocateData"]["hosts"]["node1"], 1);

    let requests = allocator.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].total(), 3);
}

#[tokio::test]
async fn negative_count_is_rejected_at_the_boundary() {
    let (_, manager, router) = setup();
    let req = json_request(
        "POST",
        "/api/v1/clusters",
        json!({ "clusterId": "web", "projection": "any", "projectionData": { "any": -1 } }),
    );
    let resp = router.oneshot(req).await.unwrap();
    assert!(resp.status().is_client_error());
    assert!(manager.cluster_ids().is_empty());
}

#[tokio::test]
async fn unknown_projection_type_is_bad_request() {
    let (_, _, router) = setup();
    let req = json_request(
        "POST",
        "/api/v1/clusters",
        json!({ "clusterId": "web", "projection": "spread" }),
    );
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("spread"));
}

#[tokio::test]
async fn unknown_cluster_is_not_found() {
    let (_, _, router) = setup();
    let req = json_request("PUT", "/api/v1/clusters/ghost", json!({ "action": "start" }));
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = Request::builder()
        .method("DELETE")
        .uri("/api/v1/clusters/ghost")
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn modify_while_stopping_conflicts() {
    let (_, manager, router) = setup();
    create_web(&router).await;
    let req = json_request("PUT", "/api/v1/clusters/web", json!({ "action": "start" }));
    router.clone().oneshot(req).await.unwrap();

    // One member keeps the cluster in STOPPING until its release completes.
    manager.on_container_allocated(&[Container::new("c1", "node1")]);
    let req = json_request("PUT", "/api/v1/clusters/web", json!({ "action": "stop" }));
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(body_json(resp).await["data"]["clusterState"], "STOPPING");

    let req = json_request(
        "PATCH",
        "/api/v1/clusters/web",
        json!({ "projectionData": { "any": 5 } }),
    );
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = router.oneshot(get("/api/v1/clusters/web")).await.unwrap();
    assert_eq!(body_json(resp).await["data"]["clusterState"], "STOPPING");
}

#[tokio::test]
async fn destroy_releases_members_and_allows_recreate() {
    let (allocator, manager, router) = setup();
    create_web(&router).await;
    let req = json_request("PUT", "/api/v1/clusters/web", json!({ "action": "start" }));
    router.clone().oneshot(req).await.unwrap();
    manager.on_container_allocated(&[Container::new("c1", "node1")]);

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/api/v1/clusters/web")
            .body(Body::empty())
            .unwrap()
    };
    let resp = router.clone().oneshot(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = router.clone().oneshot(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(*allocator.released.lock().unwrap(), vec![ContainerId::from("c1")]);

    create_web(&router).await;
}

#[tokio::test]
async fn monitor_reports_counts() {
    let (_, manager, router) = setup();
    create_web(&router).await;
    let req = json_request("PUT", "/api/v1/clusters/web", json!({ "action": "start" }));
    router.clone().oneshot(req).await.unwrap();
    let granted = [Container::new("c1", "node1"), Container::new("c2", "node2")];
    manager.on_container_allocated(&granted);
    manager.on_container_launched(&granted[..1]);

    let resp = router.oneshot(get("/api/v1/monitor")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let state = body_json(resp).await["data"].clone();
    assert_eq!(state["allocated"], 1);
    assert_eq!(state["running"], 1);
    assert_eq!(state["failed"], 0);
    assert_eq!(state["live"], 2);
    assert_eq!(state["progress"], 0.0);
}
