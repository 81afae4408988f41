//! Page API routes, including the sections of a page.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::Value;
use tower_sessions::Session;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{
    CreatePage, ListFilters, NewSection, Page, Paginated, Section, Template, UpdatePage,
};
use crate::models::template::prepare_blueprints;
use crate::routes::helpers::{
    ReorderRequest, check, found, reject_blank, reordered, require_editor, require_text,
};
use crate::services::events::{ContentAction, ContentEvent};
use crate::state::AppState;
use crate::tenant::TenantContext;

/// Create the page router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pages", get(list_pages).post(create_page))
        .route("/api/pages/reorder", post(reorder_pages))
        .route(
            "/api/pages/{id}",
            get(get_page).put(update_page).delete(delete_page),
        )
        .route("/api/pages/{id}/duplicate", post(duplicate_page))
        .route("/api/pages/{id}/toggle-published", post(toggle_published))
        .route(
            "/api/pages/{id}/sections",
            get(list_sections).post(create_section),
        )
        .route("/api/pages/{id}/sections/reorder", post(reorder_sections))
        .route("/api/pages/{id}/apply-template", post(apply_template))
}

/// Section creation body. Content is merged over the type's defaults.
#[derive(Debug, Deserialize)]
struct CreateSectionRequest {
    component_type: String,
    content: Option<Value>,
    styles: Option<Value>,
    settings: Option<Value>,
    is_visible: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ApplyTemplateRequest {
    template_id: i64,
}

fn page_event(page: &Page, action: ContentAction) -> ContentEvent {
    ContentEvent::new(page.tenant_id, "page", page.id, action).with_slug(&page.slug)
}

async fn load_page(state: &AppState, tenant: &TenantContext, id: i64) -> AppResult<Page> {
    found(Page::find_by_id(state.db(), tenant, id).await?)
}

async fn list_pages(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Query(filters): Query<ListFilters>,
) -> AppResult<Json<Paginated<Page>>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(Page::paginate(state.db(), &tenant, &filters).await?))
}

async fn get_page(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Page>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(load_page(&state, &tenant, id).await?))
}

async fn create_page(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<CreatePage>,
) -> AppResult<(StatusCode, Json<Page>)> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    require_text(&mut errors, "title", Some(&input.title));
    check(errors)?;

    let page = Page::create(state.db(), &tenant, input).await?;
    state.emit(page_event(&page, ContentAction::Created));
    Ok((StatusCode::CREATED, Json(page)))
}

async fn update_page(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<UpdatePage>,
) -> AppResult<Json<Page>> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    reject_blank(&mut errors, "title", input.title.as_deref());
    reject_blank(&mut errors, "slug", input.slug.as_deref());
    check(errors)?;

    let existing = load_page(&state, &tenant, id).await?;
    let page = Page::update(state.db(), &existing, input).await?;
    state.emit(page_event(&page, ContentAction::Updated));
    Ok(Json(page))
}

async fn delete_page(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load_page(&state, &tenant, id).await?;
    if !Page::delete(state.db(), &existing).await? {
        return Err(AppError::NotFound);
    }
    state.emit(page_event(&existing, ContentAction::Deleted));
    Ok(StatusCode::NO_CONTENT)
}

async fn duplicate_page(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<Page>)> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load_page(&state, &tenant, id).await?;
    let copy = Page::duplicate(state.db(), &existing).await?;
    state.emit(page_event(&copy, ContentAction::Created));
    Ok((StatusCode::CREATED, Json(copy)))
}

async fn toggle_published(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Page>> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load_page(&state, &tenant, id).await?;
    let page = Page::toggle_published(state.db(), &existing).await?;
    state.emit(page_event(&page, ContentAction::publication(page.is_published)));
    Ok(Json(page))
}

async fn reorder_pages(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<ReorderRequest>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    reordered(Page::reorder(state.db(), &tenant, &input.ids).await?)?;
    state.emit(ContentEvent::new(tenant.id, "page", 0, ContentAction::Reordered));
    Ok(StatusCode::NO_CONTENT)
}

async fn list_sections(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Section>>> {
    require_editor(&state, &session, &tenant).await?;

    let page = load_page(&state, &tenant, id).await?;
    Ok(Json(Section::list_for_page(state.db(), &page).await?))
}

async fn create_section(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<CreateSectionRequest>,
) -> AppResult<(StatusCode, Json<Section>)> {
    require_editor(&state, &session, &tenant).await?;

    let page = load_page(&state, &tenant, id).await?;
    let content = state
        .section_types()
        .prepare_content(&input.component_type, input.content.as_ref())
        .map_err(AppError::Validation)?;

    let section = Section::create(
        state.db(),
        &page,
        NewSection {
            component_type: input.component_type,
            content,
            styles: input.styles.unwrap_or(Value::Null),
            settings: input.settings.unwrap_or_else(|| Value::Object(Default::default())),
            is_visible: input.is_visible.unwrap_or(true),
        },
    )
    .await?;

    state.emit(
        ContentEvent::new(tenant.id, "section", section.id, ContentAction::Created)
            .with_slug(&page.slug),
    );
    Ok((StatusCode::CREATED, Json(section)))
}

async fn reorder_sections(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<ReorderRequest>,
) -> AppResult<Json<Vec<Section>>> {
    require_editor(&state, &session, &tenant).await?;

    let page = load_page(&state, &tenant, id).await?;
    reordered(Section::reorder(state.db(), &page, &input.ids).await?)?;
    state.emit(page_event(&page, ContentAction::Reordered));
    Ok(Json(Section::list_for_page(state.db(), &page).await?))
}

async fn apply_template(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<ApplyTemplateRequest>,
) -> AppResult<(StatusCode, Json<Vec<Section>>)> {
    require_editor(&state, &session, &tenant).await?;

    let page = load_page(&state, &tenant, id).await?;
    let Some(template) = Template::find_by_id(state.db(), &tenant, input.template_id).await? else {
        return Err(AppError::field("template_id", "The selected template does not exist."));
    };

    let prepared =
        prepare_blueprints(state.section_types(), &template.sections).map_err(AppError::Validation)?;
    let sections = Template::apply(state.db(), &page, prepared).await?;

    state.emit(page_event(&page, ContentAction::Updated));
    Ok((StatusCode::CREATED, Json(sections)))
}
