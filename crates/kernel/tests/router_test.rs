#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Router tests for routes that do not touch storage.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};

use tessera_test_utils::assert;

use common::{TestApp, body_bytes};

#[tokio::test]
async fn liveness_is_always_ok() {
    let app = TestApp::lazy();
    let response = app
        .request(Request::get("/health/live").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_count_served_requests() {
    let app = TestApp::lazy();
    app.request(Request::get("/health/live").body(Body::empty()).unwrap())
        .await;

    let response = app
        .request(Request::get("/metrics").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert::contains(&body, "http_request_duration_seconds");
    assert::contains(&body, "/health/live");
    assert!(body.trim_end().ends_with("# EOF"));
}

#[tokio::test]
async fn section_type_catalog_is_served() {
    let app = TestApp::lazy();

    let (status, types) = app.get_json("/api/section-types").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = types
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"hero"));
    assert!(names.contains(&"custom"));
    assert_eq!(names.len(), 12);

    let (status, hero) = app.get_json("/api/section-types/hero").await;
    assert_eq!(status, StatusCode::OK);
    assert::has_key(&hero, "schema");
    assert_eq!(hero["content_kind"], "fields");
    assert_eq!(hero["defaults"]["alignment"], "center");

    let (status, by_category) = app.get_json("/api/section-types/categories").await;
    assert_eq!(status, StatusCode::OK);
    assert!(by_category["builder"].as_array().is_some_and(|t| t.len() == 1));
}

#[tokio::test]
async fn unknown_section_type_is_not_found() {
    let app = TestApp::lazy();
    let (status, body) = app.get_json("/api/section-types/carousel").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found");
}

#[tokio::test]
async fn block_type_palette_is_served() {
    let app = TestApp::lazy();
    let (status, types) = app.get_json("/api/block-types").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(types.as_array().unwrap().len(), 11);
}

#[tokio::test]
async fn unmatched_path_is_not_found_without_tenant_lookup() {
    let app = TestApp::lazy();
    let response = app
        .request(Request::get("/api/does-not-exist").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uploaded_files_are_served_with_sniffed_type() {
    let app = TestApp::lazy();
    let dir = app.dir.path().join("uploads").join("images");
    std::fs::create_dir_all(&dir).unwrap();
    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    std::fs::write(dir.join("logo.png"), png).unwrap();

    let response = app
        .request(Request::get("/files/images/logo.png").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(body_bytes(response).await, png);

    let missing = app
        .request(Request::get("/files/images/nope.png").body(Body::empty()).unwrap())
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
