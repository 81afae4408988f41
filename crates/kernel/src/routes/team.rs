//! Team member API routes.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::Value;
use tower_sessions::Session;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{CreateTeamMember, ListFilters, Paginated, TeamMember, UpdateTeamMember};
use crate::routes::helpers::{
    ReorderRequest, check, found, reject_blank, reordered, require_editor, require_text,
};
use crate::services::events::{ContentAction, ContentEvent};
use crate::state::AppState;
use crate::tenant::TenantContext;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/team", get(list_members).post(create_member))
        .route("/api/team/reorder", post(reorder_members))
        .route(
            "/api/team/{id}",
            get(get_member).put(update_member).delete(delete_member),
        )
        .route("/api/team/{id}/toggle-published", post(toggle_published))
}

fn event(member: &TeamMember, action: ContentAction) -> ContentEvent {
    ContentEvent::new(member.tenant_id, "team_member", member.id, action)
}

async fn load(state: &AppState, tenant: &TenantContext, id: i64) -> AppResult<TeamMember> {
    found(TeamMember::find_by_id(state.db(), tenant, id).await?)
}

/// Social links are a flat object of network name to URL.
fn check_social_links(errors: &mut FieldErrors, links: Option<&Value>) {
    let valid = match links {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map.values().all(Value::is_string),
        Some(_) => false,
    };
    if !valid {
        errors.insert(
            "social_links".into(),
            "Social links must map network names to URLs.".into(),
        );
    }
}

async fn list_members(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Query(filters): Query<ListFilters>,
) -> AppResult<Json<Paginated<TeamMember>>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(TeamMember::paginate(state.db(), &tenant, &filters).await?))
}

async fn get_member(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<TeamMember>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(load(&state, &tenant, id).await?))
}

async fn create_member(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<CreateTeamMember>,
) -> AppResult<(StatusCode, Json<TeamMember>)> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    require_text(&mut errors, "name", Some(&input.name));
    check_social_links(&mut errors, input.social_links.as_ref());
    check(errors)?;

    let member = TeamMember::create(state.db(), &tenant, input).await?;
    state.emit(event(&member, ContentAction::Created));
    Ok((StatusCode::CREATED, Json(member)))
}

async fn update_member(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTeamMember>,
) -> AppResult<Json<TeamMember>> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    reject_blank(&mut errors, "name", input.name.as_deref());
    check_social_links(&mut errors, input.social_links.as_ref());
    check(errors)?;

    let existing = load(&state, &tenant, id).await?;
    let member = TeamMember::update(state.db(), &existing, input).await?;
    state.emit(event(&member, ContentAction::Updated));
    Ok(Json(member))
}

async fn delete_member(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load(&state, &tenant, id).await?;
    if !TeamMember::delete(state.db(), &existing).await? {
        return Err(AppError::NotFound);
    }
    state.emit(event(&existing, ContentAction::Deleted));
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_published(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<TeamMember>> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load(&state, &tenant, id).await?;
    let member = TeamMember::toggle_published(state.db(), &existing).await?;
    state.emit(event(&member, ContentAction::publication(member.is_published)));
    Ok(Json(member))
}

async fn reorder_members(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<ReorderRequest>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    reordered(TeamMember::reorder(state.db(), &tenant, &input.ids).await?)?;
    state.emit(ContentEvent::new(tenant.id, "team_member", 0, ContentAction::Reordered));
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn social_links_must_be_a_string_map() {
        let mut errors = FieldErrors::new();
        check_social_links(&mut errors, Some(&json!({"linkedin": "https://l.in/x"})));
        check_social_links(&mut errors, None);
        assert!(errors.is_empty());

        check_social_links(&mut errors, Some(&json!(["https://l.in/x"])));
        assert!(errors.contains_key("social_links"));
    }
}
