//! HTTP route tests

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use emotrack_ingest::{build_router, AppState};
use helpers::*;
use tower::ServiceExt;

fn app(ctx: &TestContext) -> axum::Router {
    build_router(AppState::new(ctx.services.clone()))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let ctx = test_context(fast_config());

    let response = app(&ctx)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "emotrack-ingest");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["active_sessions"], 0);
}

#[tokio::test]
async fn test_health_counts_registered_sessions() {
    let ctx = test_context(fast_config());
    ctx.services
        .registry
        .register(emotrack_ingest::registry::SessionHandle::new(42));

    let response = app(&ctx)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(body_json(response).await["active_sessions"], 1);
}

#[tokio::test]
async fn test_buildinfo_endpoint() {
    let ctx = test_context(fast_config());

    let response = app(&ctx)
        .oneshot(Request::builder().uri("/api/buildinfo").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["git_hash"].is_string());
    assert!(json["build_profile"].is_string());
    assert_eq!(json["service"], "emotrack-ingest");
    assert_eq!(json["active_sessions"], 0);
}

#[tokio::test]
async fn test_events_endpoint_is_sse() {
    let ctx = test_context(fast_config());

    let response = app(&ctx)
        .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));
}

#[tokio::test]
async fn test_video_route_requires_upgrade() {
    let ctx = test_context(fast_config());

    let response = app(&ctx)
        .oneshot(
            Request::builder()
                .uri("/ws/video?token=token-one")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let ctx = test_context(fast_config());

    let response = app(&ctx)
        .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
