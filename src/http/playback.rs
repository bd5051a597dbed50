use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::error::ApiError;
use crate::http::state::AppState;
use crate::store::{ContinueWatchingItem, PlaybackState};

const CONTINUE_WATCHING_LIMIT: usize = 20;

/// Body of `POST /api/v1/playback/{id}/position`, in seconds.
#[derive(Debug, Deserialize)]
pub struct SavePlaybackRequest {
    pub position: i64,
    pub duration: i64,
}

#[derive(Debug, Serialize)]
pub struct PlaybackResponse {
    pub media_id: String,
    pub position: u64,
    pub duration: u64,
    pub progress: f64,
}

impl From<PlaybackState> for PlaybackResponse {
    fn from(state: PlaybackState) -> Self {
        Self {
            media_id: state.media_id,
            position: state.position,
            duration: state.duration,
            progress: state.progress,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContinueWatchingResponse {
    pub items: Vec<ContinueWatchingItem>,
}

/// POST /api/v1/playback/{id}/position
pub async fn save_position(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SavePlaybackRequest>, JsonRejection>,
) -> Result<Json<PlaybackResponse>, ApiError> {
    let store = state.store.clone();
    let lookup_id = id.clone();
    if tokio::task::spawn_blocking(move || store.media_item(&lookup_id))
        .await??
        .is_none()
    {
        return Err(ApiError::media_not_found());
    }

    let Json(req) = body.map_err(|e| {
        tracing::debug!(error = %e, "invalid playback body");
        ApiError::bad_request("Invalid request body")
    })?;
    if req.duration <= 0 {
        return Err(ApiError::bad_request("Duration must be positive"));
    }

    let playback = PlaybackState::new(id, req.position.max(0) as u64, req.duration as u64);
    let store = state.store.clone();
    let saved = playback.clone();
    tokio::task::spawn_blocking(move || store.save_playback_state(&saved)).await??;

    tracing::debug!(
        media_id = %playback.media_id,
        position = playback.position,
        progress = playback.progress,
        "playback position saved"
    );
    Ok(Json(playback.into()))
}

/// GET /api/v1/playback/{id}/position: zeros when nothing was saved.
pub async fn get_position(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlaybackResponse>, ApiError> {
    let store = state.store.clone();
    let lookup_id = id.clone();
    let saved = tokio::task::spawn_blocking(move || store.playback_state(&lookup_id)).await??;

    Ok(Json(match saved {
        Some(playback) => playback.into(),
        None => PlaybackResponse {
            media_id: id,
            position: 0,
            duration: 0,
            progress: 0.0,
        },
    }))
}

/// GET /api/v1/playback/continue
pub async fn continue_watching(
    State(state): State<AppState>,
) -> Result<Json<ContinueWatchingResponse>, ApiError> {
    let store = state.store.clone();
    let items =
        tokio::task::spawn_blocking(move || store.continue_watching(CONTINUE_WATCHING_LIMIT))
            .await??;
    Ok(Json(ContinueWatchingResponse { items }))
}
