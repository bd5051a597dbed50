pub mod error;
pub mod library;
pub mod media;
pub mod playback;
pub mod state;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::http::state::AppState;

/// Any origin may call the API; range headers are allowed and exposed for players.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::RANGE])
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
        ])
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(library::health))
        .route("/api/v1/library/tree", get(library::library_tree))
        .route("/api/v1/library/scan", post(library::scan_library))
        .route("/api/v1/library/status", get(library::library_status))
        .route("/api/v1/media/{id}", get(media::get_media))
        .route("/api/v1/media/{id}/stream", get(media::stream_media))
        .route(
            "/api/v1/media/{id}/thumbnail",
            get(media::get_thumbnail).delete(media::delete_thumbnail),
        )
        .route(
            "/api/v1/playback/{id}/position",
            get(playback::get_position).post(playback::save_position),
        )
        .route("/api/v1/playback/continue", get(playback::continue_watching))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
