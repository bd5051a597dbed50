use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tower_http::services::ServeFile;

use crate::http::error::ApiError;
use crate::http::state::AppState;
use crate::media::mime::content_type;
use crate::media::thumbnail::ThumbnailError;
use crate::store::MediaRecord;

const THUMBNAIL_CACHE_CONTROL: &str = "public, max-age=86400";

#[derive(Serialize)]
pub struct MediaResponse {
    pub media: MediaRecord,
    pub stream_url: String,
}

/// Look up one record on the blocking pool.
async fn lookup_item(state: &AppState, id: String) -> Result<Option<MediaRecord>, ApiError> {
    let store = state.store.clone();
    Ok(tokio::task::spawn_blocking(move || store.media_item(&id)).await??)
}

/// GET /api/v1/media/{id}
pub async fn get_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MediaResponse>, ApiError> {
    let media = lookup_item(&state, id.clone())
        .await?
        .ok_or_else(ApiError::media_not_found)?;
    Ok(Json(MediaResponse {
        media,
        stream_url: format!("/api/v1/media/{id}/stream"),
    }))
}

/// GET /api/v1/media/{id}/stream: full or byte-range response straight from disk.
pub async fn stream_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Request,
) -> Result<Response, ApiError> {
    let item = lookup_item(&state, id)
        .await?
        .ok_or_else(ApiError::media_not_found)?;

    let mut response = ServeFile::new(&item.path)
        .try_call(req)
        .await
        .map_err(|e| {
            tracing::error!(path = %item.path.display(), error = %e, "failed to serve media file");
            ApiError::internal("Failed to read media file")
        })?
        .map(Body::new);

    if response.status().is_success() {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(content_type(&item.path)),
        );
    }
    Ok(response)
}

/// GET /api/v1/media/{id}/thumbnail
pub async fn get_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let thumbnails = state.thumbnails.clone();
    let lookup_id = id.clone();
    let result = tokio::task::spawn_blocking(move || thumbnails.get_thumbnail(&lookup_id)).await?;

    match result {
        Ok(Some(data)) => {
            tracing::debug!(id = %id, size = data.len(), "thumbnail served");
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "image/jpeg"),
                    (header::CACHE_CONTROL, THUMBNAIL_CACHE_CONTROL),
                ],
                data,
            )
                .into_response())
        }
        Ok(None) => Err(ApiError::media_not_found()),
        Err(ThumbnailError::Unavailable) => {
            Err(ApiError::unavailable("Thumbnail generation not available"))
        }
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "failed to get thumbnail");
            Err(ApiError::thumbnail_not_found())
        }
    }
}

/// DELETE /api/v1/media/{id}/thumbnail: drops the stored thumbnail so the next request regenerates it.
pub async fn delete_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if lookup_item(&state, id.clone()).await?.is_none() {
        return Err(ApiError::media_not_found());
    }

    let thumbnails = state.thumbnails.clone();
    match tokio::task::spawn_blocking(move || thumbnails.invalidate(&id)).await? {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            tracing::error!(error = %e, "failed to delete thumbnail");
            Err(ApiError::internal("Failed to delete thumbnail"))
        }
    }
}
