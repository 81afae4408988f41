//! Serving of uploaded media files.

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::warn;

use crate::file::service::classify;
use crate::state::AppState;

/// Mount the file route under `base_url` (e.g. `/files`). Absolute URLs
/// point at another server, so nothing is mounted for them.
pub fn router(base_url: &str) -> Router<AppState> {
    let base = base_url.trim_end_matches('/');
    if !base.starts_with('/') {
        return Router::new();
    }
    Router::new().route(&format!("{base}/{{*path}}"), get(serve_file))
}

async fn serve_file(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let path = path.trim_start_matches('/');

    // Storage rejects traversal; treat that the same as a missing file.
    let data = match state.media().storage().read(path).await {
        Ok(Some(data)) => data,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(path = %path, error = %e, "failed to read uploaded file");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let content_type = classify(&data, path)
        .map(|(mime, _)| mime)
        .unwrap_or_else(|_| "application/octet-stream".to_string());

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
        ],
        Body::from(data),
    )
        .into_response()
}
