//! Tenant settings API routes. Admin only.

use std::collections::BTreeMap;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use serde_json::Value;
use tower_sessions::Session;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{Setting, SettingInput};
use crate::routes::helpers::{check, found, require_admin};
use crate::services::events::{ContentAction, ContentEvent};
use crate::state::AppState;
use crate::tenant::TenantContext;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/settings", get(list_settings).put(update_settings))
        .route("/api/settings/map", get(settings_map))
        .route("/api/settings/group/{group}", get(group_map))
        .route(
            "/api/settings/{key}",
            get(get_setting).put(put_setting).delete(delete_setting),
        )
}

#[derive(Debug, Deserialize)]
struct GroupQuery {
    group: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    settings: Vec<SettingInput>,
}

#[derive(Debug, Deserialize)]
struct ValueRequest {
    value: Value,
    group: Option<String>,
}

fn event(tenant: &TenantContext, key: &str, action: ContentAction) -> ContentEvent {
    ContentEvent::new(tenant.id, "setting", 0, action).with_slug(key)
}

/// Keys are short identifiers: letters, digits, `_`, `-` and `.`.
fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 100
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn check_key(errors: &mut FieldErrors, field: String, key: &str) {
    if !valid_key(key) {
        errors.insert(field, format!("'{key}' is not a valid setting key."));
    }
}

async fn list_settings(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Query(query): Query<GroupQuery>,
) -> AppResult<Json<Vec<Setting>>> {
    require_admin(&state, &session, &tenant).await?;
    Ok(Json(
        Setting::list(state.db(), &tenant, query.group.as_deref()).await?,
    ))
}

/// Upsert several keys in one transaction.
async fn update_settings(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<BatchRequest>,
) -> AppResult<Json<BTreeMap<String, Value>>> {
    require_admin(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    for (i, setting) in input.settings.iter().enumerate() {
        check_key(&mut errors, format!("settings.{i}.key"), &setting.key);
    }
    check(errors)?;

    Setting::set_many(state.db(), &tenant, &input.settings).await?;
    state.emit(ContentEvent::new(tenant.id, "setting", 0, ContentAction::Updated));
    Ok(Json(Setting::all_as_map(state.db(), &tenant).await?))
}

async fn settings_map(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
) -> AppResult<Json<BTreeMap<String, Value>>> {
    require_admin(&state, &session, &tenant).await?;
    Ok(Json(Setting::all_as_map(state.db(), &tenant).await?))
}

async fn group_map(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(group): Path<String>,
) -> AppResult<Json<BTreeMap<String, Value>>> {
    require_admin(&state, &session, &tenant).await?;
    Ok(Json(Setting::group(state.db(), &tenant, &group).await?))
}

async fn get_setting(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(key): Path<String>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &session, &tenant).await?;
    Ok(Json(found(Setting::get(state.db(), &tenant, &key).await?)?))
}

async fn put_setting(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(key): Path<String>,
    Json(input): Json<ValueRequest>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    check_key(&mut errors, "key".into(), &key);
    check(errors)?;

    Setting::set(
        state.db(),
        tenant.id,
        &key,
        &input.value,
        input.group.as_deref(),
    )
    .await?;
    state.emit(event(&tenant, &key, ContentAction::Updated));
    Ok(Json(input.value))
}

async fn delete_setting(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(key): Path<String>,
) -> AppResult<StatusCode> {
    require_admin(&state, &session, &tenant).await?;

    if !Setting::delete(state.db(), &tenant, &key).await? {
        return Err(AppError::NotFound);
    }
    state.emit(event(&tenant, &key, ContentAction::Deleted));
    Ok(StatusCode::NO_CONTENT)
}
