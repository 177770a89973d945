//! HTTP API for live state and journal downloads
//!
//! Mirrors what the dashboard consumes: connection state, the last good
//! reading as JSON, and the dated CSV journal files for listing and
//! download. Responses are marked non-cacheable so the UI always sees live
//! values.

use axum::{
    extract::{Path as AxumPath, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::error;

use crate::journal::CsvJournal;
use crate::service::RectifierService;
use crate::{SERVICE_NAME, SERVICE_VERSION};

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<RectifierService>,
    pub journal: Arc<CsvJournal>,
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
}

/// Build the API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/state", get(get_state))
        .route("/api/data", get(get_data))
        .route("/api/logs", get(list_logs))
        .route("/api/logs/latest", get(download_latest_log))
        .route("/api/logs/{filename}", get(download_log))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "state": state.service.state(),
    }))
}

async fn get_state(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({ "state": state.service.state() }))
}

/// Last known good reading; never exposes error-tagged readings
async fn get_data(State(state): State<ApiState>) -> Response {
    match state.service.data() {
        Some(reading) => Json(reading).into_response(),
        None => Json(json!({ "status": "WAITING_FOR_DATA" })).into_response(),
    }
}

async fn list_logs(State(state): State<ApiState>) -> Response {
    match csv_files(state.journal.root_dir()).await {
        Ok(files) => Json(json!({ "files": files })).into_response(),
        Err(e) => {
            error!("failed to list journal files: {e}");
            internal_error("Failed to list journal files")
        }
    }
}

async fn download_latest_log(State(state): State<ApiState>) -> Response {
    let root = state.journal.root_dir();
    match csv_files(root.clone()).await {
        Ok(files) => match files.first() {
            Some(name) => serve_csv(root.join(name), name).await,
            None => not_found("No CSV logs yet"),
        },
        Err(e) => {
            error!("failed to list journal files: {e}");
            internal_error("Failed to list journal files")
        }
    }
}

async fn download_log(
    State(state): State<ApiState>,
    AxumPath(filename): AxumPath<String>,
) -> Response {
    if !is_safe_csv_name(&filename) {
        return not_found("File not found");
    }
    serve_csv(state.journal.root_dir().join(&filename), &filename).await
}

/// Journal file names in the root directory, newest first
async fn csv_files(root: PathBuf) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    let mut entries = match tokio::fs::read_dir(&root).await {
        Ok(entries) => entries,
        // An unused root simply has no files yet
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".csv") {
            files.push(name);
        }
    }
    // Date-embedded names sort chronologically
    files.sort_by(|a, b| b.cmp(a));
    Ok(files)
}

/// Reject anything that could escape the journal directory
fn is_safe_csv_name(name: &str) -> bool {
    name.ends_with(".csv")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
}

async fn serve_csv(path: PathBuf, download_name: &str) -> Response {
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{download_name}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => not_found("File not found"),
        Err(e) => {
            error!("failed to read journal file {}: {e}", path.display());
            internal_error("Failed to read journal file")
        }
    }
}

fn not_found(msg: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

fn internal_error(msg: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PollingConfig, ScalingConfig};
    use crate::driver::RectifierDriver;
    use crate::transport::MockTransport;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn router_fixture() -> (Router, Arc<RectifierService>, Arc<CsvJournal>, TempDir) {
        let mock = MockTransport::with_registers(&[(0, 123), (2, 45), (4, 1), (6, 0)]);
        let driver = Arc::new(RectifierDriver::new(
            Box::new(mock),
            &ScalingConfig::default(),
        ));
        let dir = TempDir::new().unwrap();
        let journal = Arc::new(CsvJournal::new(dir.path()).unwrap());
        let service = Arc::new(RectifierService::new(
            driver,
            Arc::clone(&journal),
            &PollingConfig::default(),
        ));
        let router = create_router(ApiState {
            service: Arc::clone(&service),
            journal: Arc::clone(&journal),
        });
        (router, service, journal, dir)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_state_endpoint() {
        let (router, _service, _journal, _dir) = router_fixture();
        let (status, body) = get_json(router, "/api/state").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "DISCONNECTED");
    }

    #[tokio::test]
    async fn test_data_endpoint_waiting_without_readings() {
        let (router, _service, _journal, _dir) = router_fixture();
        let (status, body) = get_json(router, "/api/data").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "WAITING_FOR_DATA");
    }

    #[tokio::test]
    async fn test_logs_listing_and_download() {
        let (router, _service, journal, _dir) = router_fixture();
        journal
            .write(&crate::types::Reading::from_registers(
                123, 45, 1, 0, 10.0, 10.0,
            ))
            .unwrap();

        let (status, body) = get_json(router.clone(), "/api/logs").await;
        assert_eq!(status, StatusCode::OK);
        let files = body["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        let name = files[0].as_str().unwrap().to_string();
        assert!(name.starts_with("rectifier_"));

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/logs/{name}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("timestamp,actual_voltage"));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/logs/latest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_download_missing_and_unsafe_names() {
        let (router, _service, _journal, _dir) = router_fixture();

        let (status, _) = get_json(router.clone(), "/api/logs/latest").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get_json(router.clone(), "/api/logs/absent.csv").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get_json(router.clone(), "/api/logs/..secrets.csv").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get_json(router, "/api/logs/notes.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_no_cache_header_present() {
        let (router, _service, _journal, _dir) = router_fixture();
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/state")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let cache = response.headers().get(header::CACHE_CONTROL).unwrap();
        assert!(cache.to_str().unwrap().contains("no-store"));
    }
}
