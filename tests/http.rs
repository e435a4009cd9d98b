//! HTTP surface: gate middleware, readiness probe, admin API.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware,
    response::Response,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use control_plane::admin::{setup_admin_router, AdminState};
use control_plane::availability::{enforce, RequiredServices};
use control_plane::http::{build_router, AppState};
use control_plane::{AvailabilityGate, HealthMonitor, OverrideMode, ServiceAvailabilityRegistry, ServiceName};

const API_KEY: &str = "test-key";

async fn body_json(res: Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {API_KEY}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn admin_app() -> (Router, Arc<ServiceAvailabilityRegistry>, Arc<HealthMonitor>) {
    let registry = Arc::new(ServiceAvailabilityRegistry::new());
    let monitor = Arc::new(HealthMonitor::new(
        registry.clone(),
        Duration::from_secs(60),
        Duration::from_millis(200),
    ));
    let state = AdminState {
        registry: registry.clone(),
        monitor: monitor.clone(),
        api_key: Arc::from(API_KEY),
    };
    (setup_admin_router(state), registry, monitor)
}

#[tokio::test]
async fn test_gate_middleware_rejects_with_retry_after() {
    let registry = Arc::new(ServiceAvailabilityRegistry::new());
    registry.update_health(ServiceName::Database, true, None);
    let gate = AvailabilityGate::new(registry.clone()).with_retry_after(Duration::from_secs(12));

    let app = Router::new().route("/orders", get(|| async { "ok" })).layer(
        middleware::from_fn_with_state(
            RequiredServices::new(gate, [ServiceName::Database, ServiceName::Broker]),
            enforce,
        ),
    );

    let res = app.clone().oneshot(get_request("/orders")).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        res.headers().get(header::RETRY_AFTER).unwrap().to_str().unwrap(),
        "12"
    );
    assert_eq!(
        body_json(res).await,
        json!({ "unavailableServices": ["broker"], "retryAfterSeconds": 12 })
    );

    registry.set_override(ServiceName::Broker, OverrideMode::ForceEnable);
    let res = app.oneshot(get_request("/orders")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_follows_availability() {
    let registry = Arc::new(ServiceAvailabilityRegistry::new());
    let state = AppState {
        gate: AvailabilityGate::new(registry.clone()),
        readiness: Arc::from(vec![ServiceName::Database, ServiceName::Cache]),
    };
    let app = build_router(state);

    let res = app.clone().oneshot(get_request("/health/live")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.clone().oneshot(get_request("/health/ready")).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(res).await;
    assert_eq!(body["unavailableServices"], json!(["database", "cache"]));

    registry.mark_all_available();
    let res = app.oneshot(get_request("/health/ready")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({ "status": "ready" }));
}

#[tokio::test]
async fn test_admin_requires_bearer_token() {
    let (app, _, _) = admin_app();

    let res = app.clone().oneshot(get_request("/admin/services")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app.oneshot(admin_request("GET", "/admin/services", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let services = body_json(res).await;
    assert_eq!(services.as_array().unwrap().len(), ServiceName::COUNT);
}

#[tokio::test]
async fn test_admin_override_round_trip() {
    let (app, registry, _) = admin_app();
    registry.update_health(ServiceName::Auth, true, None);

    let res = app
        .clone()
        .oneshot(admin_request(
            "PUT",
            "/admin/services/auth/override",
            Some(json!({ "mode": "force_disable" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let view = body_json(res).await;
    assert_eq!(view["override_mode"], "force_disable");
    assert_eq!(view["available"], false);
    assert_eq!(view["health_available"], true);
    assert!(!registry.is_available(ServiceName::Auth));

    let res = app
        .oneshot(admin_request(
            "PUT",
            "/admin/services/mainframe/override",
            Some(json!({ "mode": "none" })),
        ))
        .await
        .unwrap();
    assert!(res.status().is_client_error());
}

#[tokio::test]
async fn test_admin_triggered_check() {
    let (app, registry, monitor) = admin_app();
    monitor.register_health_check(ServiceName::Storage, || async { Ok(true) });

    let res = app.clone().oneshot(admin_request("POST", "/admin/health/check", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let results = body_json(res).await;
    assert_eq!(results.as_array().unwrap().len(), 1);
    assert_eq!(results[0]["service"], "storage");
    assert_eq!(results[0]["healthy"], true);
    assert!(registry.is_available(ServiceName::Storage));

    let res = app.oneshot(admin_request("GET", "/admin/status", None)).await.unwrap();
    let status = body_json(res).await;
    assert_eq!(status["monitor"], "stopped");
    assert_eq!(status["available"], 1);
}
