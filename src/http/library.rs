use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::http::error::ApiError;
use crate::http::state::AppState;
use crate::media::library::{build_tree, LibraryTree};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct CacheStatus {
    pub count: usize,
    pub bytes: u64,
    pub capacity: usize,
    pub max_bytes: u64,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub scanning: bool,
    pub cache: CacheStatus,
    pub extractor_available: bool,
    pub generator_available: bool,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("REELSHELF_VERSION"),
    })
}

/// GET /api/v1/library/tree
pub async fn library_tree(State(state): State<AppState>) -> Result<Json<LibraryTree>, ApiError> {
    let store = state.store.clone();
    let name = state.library.name.clone();
    let tree = tokio::task::spawn_blocking(move || build_tree(store.as_ref(), &name)).await??;
    Ok(Json(tree))
}

/// POST /api/v1/library/scan: starts a scan in the background and returns at once.
pub async fn scan_library(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ScanResponse>), ApiError> {
    if state.scanner.is_scanning() {
        return Ok((
            StatusCode::OK,
            Json(ScanResponse {
                status: "in_progress",
                message: "Scan already in progress",
            }),
        ));
    }

    if state.library.path.is_none() {
        return Err(ApiError::bad_request("No library path configured"));
    }

    tokio::spawn(async move { state.scan_and_enrich().await });

    Ok((
        StatusCode::ACCEPTED,
        Json(ScanResponse {
            status: "started",
            message: "Library scan started",
        }),
    ))
}

/// GET /api/v1/library/status
pub async fn library_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let (count, bytes) = state.thumbnails.cache_stats();
    let (capacity, max_bytes) = state.thumbnails.cache_limits();
    // Availability checks search PATH.
    let thumbnails = state.thumbnails.clone();
    let (extractor_available, generator_available) = tokio::task::spawn_blocking(move || {
        (thumbnails.extractor_available(), thumbnails.generator_available())
    })
    .await?;
    Ok(Json(StatusResponse {
        scanning: state.scanner.is_scanning(),
        cache: CacheStatus {
            count,
            bytes,
            capacity,
            max_bytes,
        },
        extractor_available,
        generator_available,
    }))
}
