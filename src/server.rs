//! HTTP endpoint: `POST /analyze` with a multipart `pdf_file` field.
//!
//! | Outcome                                 | Status | Body                   |
//! |-----------------------------------------|--------|------------------------|
//! | report produced (even if sections failed) | 200  | [`ReportAnalysis`] JSON |
//! | no file / empty filename / empty file   | 400    | `{"error": "…"}`       |
//! | upload is not a PDF or has no pages     | 422    | `{"error": "…"}`       |
//! | anything else                           | 500    | `{"error": "…"}`       |
//!
//! `GET /health` answers `ok` without touching the model.

use crate::analyze::{Analyzer, Submission};
use crate::error::ReportError;
use crate::output::ReportAnalysis;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Name of the multipart field carrying the report.
pub const FILE_FIELD: &str = "pdf_file";

/// Upload size limit (50 MB).
const BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Build the application router around a shared analyzer.
pub fn router(analyzer: Arc<Analyzer>) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(analyzer)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, analyzer: Arc<Analyzer>) -> std::io::Result<()> {
    let app = router(analyzer);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}

async fn health() -> &'static str {
    "ok"
}

async fn analyze(State(analyzer): State<Arc<Analyzer>>, multipart: Multipart) -> Response {
    let submission = match parse_multipart(multipart).await {
        Ok(s) => s,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match analyzer.analyze(submission).await {
        Ok(report) => ok_response(report),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                warn!("Analysis failed: {}", e);
            }
            error_response(status, &e.to_string())
        }
    }
}

/// Take the first `pdf_file` field; fields before it are drained and
/// ignored, anything after it is never read.
async fn parse_multipart(mut multipart: Multipart) -> Result<Submission, String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Failed to read form field: {}", e))?
    {
        if field.name() == Some(FILE_FIELD) {
            let filename = field.file_name().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| format!("Failed to read file data: {}", e))?;
            return Ok(Submission {
                filename,
                bytes: Some(data.to_vec()),
            });
        }
        field
            .bytes()
            .await
            .map_err(|e| format!("Failed to read form field: {}", e))?;
    }

    Ok(Submission::empty())
}

fn status_for(error: &ReportError) -> StatusCode {
    match error {
        ReportError::Validation(_) => StatusCode::BAD_REQUEST,
        ReportError::Rasterization(_) | ReportError::Composite(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ok_response(report: ReportAnalysis) -> Response {
    (StatusCode::OK, Json(report)).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
