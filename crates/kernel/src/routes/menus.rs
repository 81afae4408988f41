//! Navigation menu API routes.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use tower_sessions::Session;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::menu::validate_items;
use crate::models::{CreateMenu, ListFilters, Menu, UpdateMenu};
use crate::routes::helpers::{check, found, reject_blank, require_editor, require_text};
use crate::services::events::{ContentAction, ContentEvent};
use crate::state::AppState;
use crate::tenant::TenantContext;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/menus", get(list_menus).post(create_menu))
        .route("/api/menus/location/{location}", get(get_by_location))
        .route(
            "/api/menus/{id}",
            get(get_menu).put(update_menu).delete(delete_menu),
        )
}

fn event(menu: &Menu, action: ContentAction) -> ContentEvent {
    ContentEvent::new(menu.tenant_id, "menu", menu.id, action).with_slug(&menu.location)
}

async fn load(state: &AppState, tenant: &TenantContext, id: i64) -> AppResult<Menu> {
    found(Menu::find_by_id(state.db(), tenant, id).await?)
}

/// Merge item-tree errors and the location uniqueness check into `errors`.
async fn check_menu(
    state: &AppState,
    tenant: &TenantContext,
    errors: &mut FieldErrors,
    location: Option<&str>,
    items: Option<&serde_json::Value>,
    except: Option<i64>,
) -> AppResult<()> {
    if let Some(items) = items {
        errors.extend(validate_items(items));
    }
    if let Some(location) = location
        && !location.trim().is_empty()
        && Menu::location_taken(state.db(), tenant, location, except).await?
    {
        errors.insert(
            "location".into(),
            format!("A menu is already assigned to '{location}'."),
        );
    }
    Ok(())
}

async fn list_menus(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Query(filters): Query<ListFilters>,
) -> AppResult<Json<Vec<Menu>>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(Menu::list(state.db(), &tenant, &filters).await?))
}

async fn get_menu(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Menu>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(load(&state, &tenant, id).await?))
}

async fn get_by_location(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(location): Path<String>,
) -> AppResult<Json<Menu>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(found(
        Menu::find_by_location(state.db(), &tenant, &location).await?,
    )?))
}

async fn create_menu(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<CreateMenu>,
) -> AppResult<(StatusCode, Json<Menu>)> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    require_text(&mut errors, "name", Some(&input.name));
    require_text(&mut errors, "location", Some(&input.location));
    check_menu(
        &state,
        &tenant,
        &mut errors,
        Some(&input.location),
        input.items.as_ref(),
        None,
    )
    .await?;
    check(errors)?;

    let menu = Menu::create(state.db(), &tenant, input).await?;
    state.emit(event(&menu, ContentAction::Created));
    Ok((StatusCode::CREATED, Json(menu)))
}

async fn update_menu(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<UpdateMenu>,
) -> AppResult<Json<Menu>> {
    require_editor(&state, &session, &tenant).await?;
    let existing = load(&state, &tenant, id).await?;

    let mut errors = FieldErrors::new();
    reject_blank(&mut errors, "name", input.name.as_deref());
    reject_blank(&mut errors, "location", input.location.as_deref());
    check_menu(
        &state,
        &tenant,
        &mut errors,
        input.location.as_deref(),
        input.items.as_ref(),
        Some(existing.id),
    )
    .await?;
    check(errors)?;

    let menu = Menu::update(state.db(), &existing, input).await?;
    state.emit(event(&menu, ContentAction::Updated));
    Ok(Json(menu))
}

async fn delete_menu(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load(&state, &tenant, id).await?;
    if !Menu::delete(state.db(), &existing).await? {
        return Err(AppError::NotFound);
    }
    state.emit(event(&existing, ContentAction::Deleted));
    Ok(StatusCode::NO_CONTENT)
}
