//! Section API routes.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::models::{Page, Section, UpdateSection};
use crate::routes::helpers::{found, require_editor};
use crate::services::events::{ContentAction, ContentEvent};
use crate::state::AppState;
use crate::tenant::TenantContext;

/// Create the section router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/sections/{id}",
            get(get_section).put(update_section).delete(delete_section),
        )
        .route("/api/sections/{id}/duplicate", post(duplicate_section))
        .route("/api/sections/{id}/toggle-visibility", post(toggle_visibility))
}

/// Load a section with its page, both scoped to `tenant`.
pub(crate) async fn load_section(
    state: &AppState,
    tenant: &TenantContext,
    id: i64,
) -> AppResult<(Section, Page)> {
    let section = found(Section::find_by_id(state.db(), tenant, id).await?)?;
    let page = found(Page::find_by_id(state.db(), tenant, section.page_id).await?)?;
    Ok((section, page))
}

pub(crate) fn section_event(section: &Section, page: &Page, action: ContentAction) -> ContentEvent {
    ContentEvent::new(section.tenant_id, "section", section.id, action).with_slug(&page.slug)
}

async fn get_section(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Section>> {
    require_editor(&state, &session, &tenant).await?;
    let (section, _) = load_section(&state, &tenant, id).await?;
    Ok(Json(section))
}

/// Partial update. A content patch is merged over the stored content and
/// the result validated against the section type.
async fn update_section(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(mut input): Json<UpdateSection>,
) -> AppResult<Json<Section>> {
    require_editor(&state, &session, &tenant).await?;
    let (existing, page) = load_section(&state, &tenant, id).await?;

    if let Some(patch) = input.content.take() {
        let registry = state.section_types();
        let patch = registry
            .shape_content(&existing.component_type, &patch)
            .map_err(AppError::Validation)?;
        let merged = existing.merged_content(&patch);
        let checked = registry
            .check_content(&existing.component_type, merged)
            .map_err(AppError::Validation)?;
        input.content = Some(checked);
    }

    let section = Section::update(state.db(), &existing, input).await?;
    state.emit(section_event(&section, &page, ContentAction::Updated));
    Ok(Json(section))
}

async fn delete_section(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;
    let (existing, page) = load_section(&state, &tenant, id).await?;

    if !Section::delete(state.db(), &existing).await? {
        return Err(AppError::NotFound);
    }
    state.emit(section_event(&existing, &page, ContentAction::Deleted));
    Ok(StatusCode::NO_CONTENT)
}

async fn duplicate_section(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<Section>)> {
    require_editor(&state, &session, &tenant).await?;
    let (existing, page) = load_section(&state, &tenant, id).await?;

    let copy = Section::duplicate(state.db(), &existing).await?;
    state.emit(section_event(&copy, &page, ContentAction::Created));
    Ok((StatusCode::CREATED, Json(copy)))
}

async fn toggle_visibility(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Section>> {
    require_editor(&state, &session, &tenant).await?;
    let (existing, page) = load_section(&state, &tenant, id).await?;

    let section = Section::toggle_visibility(state.db(), &existing).await?;
    state.emit(section_event(&section, &page, ContentAction::Updated));
    Ok(Json(section))
}
