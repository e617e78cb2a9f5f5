//! Drives the router in-process via `tower::ServiceExt::oneshot`, against
//! a config pointed at a scratch `TempDir` so tests never touch a real
//! `~/.testtrack`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use testtrack_core::config::TestTrackConfig;
use testtrack_server::router;
use testtrack_server::state::AppState;

fn test_config(dir: &std::path::Path) -> TestTrackConfig {
    TestTrackConfig {
        work_dir: dir.to_path_buf(),
        cli_url: None,
        app_name: None,
        config_dir: dir.join("config"),
        fake_server_config_dir: dir.join("config").join("fake_server"),
        ownership_file: dir.join("owners.yml"),
        allowed_origins: Vec::new(),
    }
}

fn write_schema_link(config: &TestTrackConfig, basename: &str, yaml: &str) {
    let dir = config.schemas_link_dir();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{basename}.yml")), yaml).unwrap();
}

const SCHEMA_YAML: &str = r#"
serializer_version: 1
schema_version: "1000000000001"
splits:
  - name: foo_experiment
    weights:
      a: 50
      b: 50
    decided: false
identifier_types: []
remote_kills: []
feature_completions: []
"#;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn split_registry_v1_reports_weights_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_schema_link(&config, "app", SCHEMA_YAML);
    let app = router::build(Arc::new(AppState::new(config)));

    let response = app
        .oneshot(Request::get("/api/v1/split_registry").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["foo_experiment"]["a"], 50);
    assert_eq!(body["foo_experiment"]["b"], 50);
}

#[tokio::test]
async fn split_registry_v4_reports_variants_as_array() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_schema_link(&config, "app", SCHEMA_YAML);
    let app = router::build(Arc::new(AppState::new(config)));

    let response = app
        .oneshot(Request::get("/api/v4/builds/42/split_registry").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["splits"][0]["name"], "foo_experiment");
    assert_eq!(body["splits"][0]["variants"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn visitor_endpoint_returns_sentinel_id_and_empty_assignments_with_no_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let app = router::build(Arc::new(AppState::new(config)));

    let response = app
        .oneshot(Request::get("/api/v1/visitors/whatever").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], "00000000-0000-0000-0000-000000000000");
    assert_eq!(body["assignments"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn assignment_override_json_single_then_visitor_reflects_it() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let app = router::build(Arc::new(AppState::new(config)));

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/assignment_override")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"split_name":"foo_experiment","variant":"a"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(Request::get("/api/v1/visitors/whatever").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["assignments"][0]["split_name"], "foo_experiment");
    assert_eq!(body["assignments"][0]["variant"], "a");
    assert_eq!(body["assignments"][0]["unsynced"], true);
}

#[tokio::test]
async fn assignment_override_form_encoded_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let app = router::build(Arc::new(AppState::new(config)));

    let response = app
        .oneshot(
            Request::post("/api/v1/assignment_override")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("split_name=foo_experiment&variant=b"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn assignment_override_unknown_content_type_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let app = router::build(Arc::new(AppState::new(config)));

    let response = app
        .oneshot(
            Request::post("/api/v1/assignment_override")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("nonsense"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn assignment_event_is_a_noop_204() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let app = router::build(Arc::new(AppState::new(config)));

    let response = app
        .oneshot(
            Request::post("/api/v1/assignment_event")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn identifier_post_returns_sentinel_visitor_id() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let app = router::build(Arc::new(AppState::new(config)));

    let response = app
        .oneshot(Request::post("/api/v1/identifier").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["id"], "00000000-0000-0000-0000-000000000000");
}

#[tokio::test]
async fn split_details_is_a_stub_keyed_by_the_requested_id() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let app = router::build(Arc::new(AppState::new(config)));

    let response = app
        .oneshot(Request::get("/api/v1/split_details/foo_experiment").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], "foo_experiment");
}
