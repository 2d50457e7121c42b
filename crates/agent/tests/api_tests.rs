//! Integration tests for the agent HTTP endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use podlens_lib::{
    api::{create_router, AppState, MAX_BODY_BYTES, NO_RESULT_ANSWER},
    health::{Component, HealthRegistry},
    observability::{PipelineMetrics, StructuredLogger},
    query::QueryService,
    store::WeaviateGateway,
    Error,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app(store_url: Option<String>) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new(&[Component::Query, Component::Store]);

    let metrics = PipelineMetrics::new();
    let mut state = AppState::new(health_registry.clone(), metrics.clone());
    if let Some(url) = store_url {
        let query = QueryService::new(
            WeaviateGateway::new(url, None).unwrap(),
            StructuredLogger::new("serve"),
            metrics,
            health_registry.clone(),
        );
        state = state.with_query(Arc::new(query));
    }

    let state = Arc::new(state);
    (create_router(state.clone()), state)
}

fn query_request(content_type: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/");
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    builder.body(body.into()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

async fn generation_store(answer: serde_json::Value) -> mockito::ServerGuard {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/graphql")
        .with_status(200)
        .with_body(
            json!({ "data": { "Get": { "Pod": [
                { "name": "api", "_additional": { "generate": { "groupedResult": answer, "error": null } } }
            ] } } })
            .to_string(),
        )
        .create_async()
        .await;
    server
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app(None).await;

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let health: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["query"].is_object());
    assert!(health["components"]["store"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app(None).await;

    state
        .health_registry
        .record_degraded(Component::Store, "1 object(s) could not be deleted")
        .await;

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    // Degraded is still operational
    assert_eq!(response.status(), StatusCode::OK);

    let health: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app(None).await;

    state
        .health_registry
        .record_failure(
            Component::Store,
            &Error::StoreUnavailable("received status code 503".to_string()),
        )
        .await;

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_tracks_readiness() {
    let (app, state) = setup_test_app(None).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    state.health_registry.mark_started().await;

    let response = app
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let readiness: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app(None).await;

    state.metrics.observe_scrape_cycle(0.8);
    state.metrics.observe_query_latency(1.5);
    state.metrics.add_objects_ingested(2);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let metrics_text = body_text(response).await;
    assert!(metrics_text.contains("podlens_scrape_cycle_seconds_bucket"));
    assert!(metrics_text.contains("podlens_query_latency_seconds_count"));
    assert!(metrics_text.contains("podlens_objects_ingested_total"));
}

#[tokio::test]
async fn test_query_returns_generated_answer() {
    let store = generation_store(json!("The api pod uses the most CPU.")).await;
    let (app, _state) = setup_test_app(Some(store.url())).await;

    let response = app
        .oneshot(query_request(
            Some("application/json"),
            r#"{"body":"which pod uses the most CPU"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "The api pod uses the most CPU.");
}

#[tokio::test]
async fn test_query_without_content_type_is_accepted() {
    let store = generation_store(json!("ok")).await;
    let (app, _state) = setup_test_app(Some(store.url())).await;

    let response = app
        .oneshot(query_request(None, r#"{"body":"anything"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_query_with_no_result_returns_fixed_sentence() {
    let mut store = mockito::Server::new_async().await;
    store
        .mock("POST", "/v1/graphql")
        .with_status(200)
        .with_body(r#"{"data":{"Get":{"Pod":[]}}}"#)
        .create_async()
        .await;
    let (app, _state) = setup_test_app(Some(store.url())).await;

    let response = app
        .oneshot(query_request(Some("application/json"), r#"{"body":""}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, NO_RESULT_ANSWER);
}

#[tokio::test]
async fn test_query_failure_hides_detail() {
    let mut store = mockito::Server::new_async().await;
    store
        .mock("POST", "/v1/graphql")
        .with_status(200)
        .with_body(r#"{"errors":[{"message":"secret internal detail"}]}"#)
        .create_async()
        .await;
    let (app, _state) = setup_test_app(Some(store.url())).await;

    let response = app
        .oneshot(query_request(Some("application/json"), r#"{"body":"q"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = body_text(response).await;
    assert!(!text.contains("secret internal detail"));
    let error: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(error["error"].is_string());
}

#[tokio::test]
async fn test_query_rejects_wrong_content_type() {
    let store = generation_store(json!("unused")).await;
    let (app, _state) = setup_test_app(Some(store.url())).await;

    let response = app
        .oneshot(query_request(Some("text/plain"), r#"{"body":"q"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_query_rejects_malformed_bodies() {
    let store = generation_store(json!("unused")).await;
    let (app, _state) = setup_test_app(Some(store.url())).await;

    for body in [
        r#"{"body": "#,
        r#"{"question":"q"}"#,
        r#"{"body":"q"}{"body":"again"}"#,
        "",
    ] {
        let response = app
            .clone()
            .oneshot(query_request(Some("application/json"), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let error: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(error["error"].is_string());
    }
}

#[tokio::test]
async fn test_query_rejects_oversized_body() {
    let store = generation_store(json!("unused")).await;
    let (app, _state) = setup_test_app(Some(store.url())).await;

    let question = "x".repeat(MAX_BODY_BYTES + 1);
    let body = json!({ "body": question }).to_string();

    let response = app
        .oneshot(query_request(Some("application/json"), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_failed_query_marks_service_unhealthy() {
    let mut store = mockito::Server::new_async().await;
    store
        .mock("POST", "/v1/graphql")
        .with_status(503)
        .create_async()
        .await;
    let (app, _state) = setup_test_app(Some(store.url())).await;

    let response = app
        .clone()
        .oneshot(query_request(Some("application/json"), r#"{"body":"q"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(health["components"]["query"]["status"], "unhealthy");
    assert_eq!(health["components"]["query"]["consecutive_failures"], 1);
}
