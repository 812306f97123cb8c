//! HTTP endpoint tests: requests are driven through the router with
//! `tower::ServiceExt::oneshot`, no socket is bound.
#![cfg(feature = "server")]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use reportrx::server::router;
use reportrx::AnalysisConfig;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "reportrx-test-boundary";

fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    multipart_parts(&[(field, filename, bytes)])
}

fn multipart_parts(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn analyze_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn app(dir: &std::path::Path) -> axum::Router {
    let analyzer = analyzer(
        dir,
        ScriptedModel::answering(),
        Arc::new(UniformRasterizer {
            pages: 2,
            width: 8,
            height: 6,
        }),
        AnalysisConfig::default(),
    );
    router(Arc::new(analyzer))
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn upload_returns_report() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(analyze_request(multipart_body(
            "pdf_file",
            "cbc.pdf",
            &fake_pdf(),
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["filename"], "cbc.pdf");
    assert_eq!(json["sections"].as_array().unwrap().len(), 6);
    assert_eq!(json["composite"]["height"], 12);
    assert!(json["composite_data_uri"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn missing_field_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(analyze_request(multipart_body(
            "attachment",
            "cbc.pdf",
            &fake_pdf(),
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "No file selected.");
}

#[tokio::test]
async fn empty_filename_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(analyze_request(multipart_body("pdf_file", "", &fake_pdf())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"]
        .as_str()
        .unwrap()
        .starts_with("No file selected"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn non_pdf_is_unprocessable() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(analyze_request(multipart_body(
            "pdf_file",
            "photo.png",
            b"\x89PNG\r\n\x1a\n",
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json_body(response).await["error"]
        .as_str()
        .unwrap()
        .contains("not a valid PDF"));
}

#[tokio::test]
async fn first_file_field_wins() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = fake_pdf();
    let response = app(dir.path())
        .oneshot(analyze_request(multipart_parts(&[
            ("notes", "notes.txt", &b"ignored"[..]),
            ("pdf_file", "first.pdf", pdf.as_slice()),
            ("pdf_file", "second.pdf", pdf.as_slice()),
        ])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["filename"], "first.pdf");
}

#[tokio::test]
async fn truncated_form_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"notes\"\r\n\r\nno closing boundary",
    );
    let response = app(dir.path())
        .oneshot(analyze_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn health_check() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"ok");
}
