//! Media library API routes.
//!
//! Uploads arrive as multipart/form-data with the fields:
//! - `file`: the file (required)
//! - `folder`: target folder, defaults to `uploads`
//! - `alt_text`: alternative text for images

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
};
use tower_sessions::Session;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::file::{MAX_FILE_SIZE, Upload, UploadError};
use crate::models::{Media, MediaFilters, Paginated, UpdateMedia};
use crate::routes::helpers::{found, require_editor};
use crate::services::events::{ContentAction, ContentEvent};
use crate::state::AppState;
use crate::tenant::TenantContext;

/// Room for the multipart framing and the text fields.
const FORM_OVERHEAD: usize = 64 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/media", get(list_media).post(upload_media))
        .route("/api/media/folders", get(list_folders))
        .route(
            "/api/media/{id}",
            get(get_media).put(update_media).delete(delete_media),
        )
        .layer(DefaultBodyLimit::max(MAX_FILE_SIZE + FORM_OVERHEAD))
}

fn event(media: &Media, action: ContentAction) -> ContentEvent {
    ContentEvent::new(media.tenant_id, "media", media.id, action)
}

fn upload_error(error: UploadError) -> AppError {
    match error {
        UploadError::Internal(e) => AppError::Internal(e),
        UploadError::InvalidFolder => AppError::field("folder", error.to_string()),
        other => AppError::field("file", other.to_string()),
    }
}

/// Collect the upload fields. Unknown fields are skipped.
async fn read_upload(mut multipart: Multipart) -> AppResult<Upload> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut folder = None;
    let mut alt_text = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    warn!(error = %e, "failed to read upload data");
                    AppError::BadRequest("failed to read file data".into())
                })?;
                file = Some((name, bytes.to_vec()));
            }
            "folder" => folder = Some(read_text(field).await?),
            "alt_text" => alt_text = Some(read_text(field).await?),
            _ => {}
        }
    }

    let Some((original_name, data)) = file else {
        return Err(AppError::field("file", "The file field is required."));
    };
    Ok(Upload {
        original_name,
        data,
        folder: folder.filter(|f: &String| !f.trim().is_empty()),
        alt_text: alt_text.filter(|a: &String| !a.trim().is_empty()),
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid form field: {e}")))
}

async fn list_media(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Query(filters): Query<MediaFilters>,
) -> AppResult<Json<Paginated<Media>>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(Media::paginate(state.db(), &tenant, &filters).await?))
}

async fn list_folders(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
) -> AppResult<Json<Vec<String>>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(Media::folders(state.db(), &tenant).await?))
}

async fn get_media(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Media>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(found(Media::find_by_id(state.db(), &tenant, id).await?)?))
}

async fn upload_media(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Media>)> {
    require_editor(&state, &session, &tenant).await?;

    let upload = read_upload(multipart).await?;
    let media = state
        .media()
        .upload(&tenant, upload)
        .await
        .map_err(upload_error)?;

    state.emit(event(&media, ContentAction::Created));
    Ok((StatusCode::CREATED, Json(media)))
}

/// Only the alt text is editable; the file itself is immutable.
async fn update_media(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<UpdateMedia>,
) -> AppResult<Json<Media>> {
    require_editor(&state, &session, &tenant).await?;

    let existing = found(Media::find_by_id(state.db(), &tenant, id).await?)?;
    let media = Media::update(state.db(), &existing, input).await?;
    state.emit(event(&media, ContentAction::Updated));
    Ok(Json(media))
}

async fn delete_media(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    let existing = found(Media::find_by_id(state.db(), &tenant, id).await?)?;
    if !state.media().delete(&existing).await? {
        return Err(AppError::NotFound);
    }
    state.emit(event(&existing, ContentAction::Deleted));
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_errors_become_field_errors() {
        let AppError::Validation(fields) = upload_error(UploadError::Empty) else {
            panic!("expected a validation error");
        };
        assert!(fields.contains_key("file"));

        let AppError::Validation(fields) = upload_error(UploadError::InvalidFolder) else {
            panic!("expected a validation error");
        };
        assert!(fields.contains_key("folder"));
    }
}
