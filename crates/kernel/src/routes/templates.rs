//! Page template API routes.
//!
//! A template is a named list of section blueprints. Blueprints are checked
//! against the section registry when saved so that applying a template to
//! a page cannot fail on content.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde_json::Value;
use tower_sessions::Session;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::template::prepare_blueprints;
use crate::models::{CreateTemplate, ListFilters, Template, UpdateTemplate};
use crate::routes::helpers::{check, found, reject_blank, require_editor, require_text};
use crate::services::events::{ContentAction, ContentEvent};
use crate::state::AppState;
use crate::tenant::TenantContext;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/templates", get(list_templates).post(create_template))
        .route(
            "/api/templates/{id}",
            get(get_template)
                .put(update_template)
                .delete(delete_template),
        )
}

fn event(template: &Template, action: ContentAction) -> ContentEvent {
    ContentEvent::new(template.tenant_id, "template", template.id, action)
        .with_slug(&template.slug)
}

async fn load(state: &AppState, tenant: &TenantContext, id: i64) -> AppResult<Template> {
    found(Template::find_by_id(state.db(), tenant, id).await?)
}

fn check_sections(state: &AppState, errors: &mut FieldErrors, sections: Option<&Value>) {
    if let Some(sections) = sections
        && let Err(section_errors) = prepare_blueprints(state.section_types(), sections)
    {
        errors.extend(section_errors);
    }
}

async fn list_templates(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Query(filters): Query<ListFilters>,
) -> AppResult<Json<Vec<Template>>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(Template::list(state.db(), &tenant, &filters).await?))
}

async fn get_template(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Template>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(load(&state, &tenant, id).await?))
}

async fn create_template(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<CreateTemplate>,
) -> AppResult<(StatusCode, Json<Template>)> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    require_text(&mut errors, "name", Some(&input.name));
    check_sections(&state, &mut errors, input.sections.as_ref());
    check(errors)?;

    let template = Template::create(state.db(), &tenant, input).await?;
    state.emit(event(&template, ContentAction::Created));
    Ok((StatusCode::CREATED, Json(template)))
}

async fn update_template(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTemplate>,
) -> AppResult<Json<Template>> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    reject_blank(&mut errors, "name", input.name.as_deref());
    reject_blank(&mut errors, "slug", input.slug.as_deref());
    check_sections(&state, &mut errors, input.sections.as_ref());
    check(errors)?;

    let existing = load(&state, &tenant, id).await?;
    let template = Template::update(state.db(), &existing, input).await?;
    state.emit(event(&template, ContentAction::Updated));
    Ok(Json(template))
}

async fn delete_template(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load(&state, &tenant, id).await?;
    if !Template::delete(state.db(), &existing).await? {
        return Err(AppError::NotFound);
    }
    state.emit(event(&existing, ContentAction::Deleted));
    Ok(StatusCode::NO_CONTENT)
}
