//! User management API routes. Admin only.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use tower_sessions::Session;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::user::MIN_PASSWORD_LENGTH;
use crate::models::{CreateUser, ListFilters, Paginated, UpdateUser, User};
use crate::routes::helpers::{check, found, reject_blank, require_admin, require_text};
use crate::state::AppState;
use crate::tenant::TenantContext;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    let email = email.trim();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        errors.insert("email".into(), "The email must be a valid address.".into());
    }
}

fn check_password(errors: &mut FieldErrors, password: &str) {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.insert(
            "password".into(),
            format!("The password must be at least {MIN_PASSWORD_LENGTH} characters."),
        );
    }
}

/// Emails are unique across all tenants.
async fn check_email_free(
    state: &AppState,
    errors: &mut FieldErrors,
    email: &str,
    except: Option<i64>,
) -> AppResult<()> {
    if let Some(other) = User::find_by_email(state.db(), email).await?
        && Some(other.id) != except
    {
        errors.insert("email".into(), "The email has already been taken.".into());
    }
    Ok(())
}

async fn list_users(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Query(filters): Query<ListFilters>,
) -> AppResult<Json<Paginated<User>>> {
    require_admin(&state, &session, &tenant).await?;
    Ok(Json(User::paginate(state.db(), &tenant, &filters).await?))
}

async fn get_user(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    require_admin(&state, &session, &tenant).await?;
    Ok(Json(found(User::find_in_tenant(state.db(), &tenant, id).await?)?))
}

async fn create_user(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    require_admin(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    require_text(&mut errors, "name", Some(&input.name));
    check_email(&mut errors, &input.email);
    check_password(&mut errors, &input.password);
    if errors.is_empty() {
        check_email_free(&state, &mut errors, &input.email, None).await?;
    }
    check(errors)?;

    let user = User::create(state.db(), tenant.id, input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<UpdateUser>,
) -> AppResult<Json<User>> {
    let admin = require_admin(&state, &session, &tenant).await?;
    let existing = found(User::find_in_tenant(state.db(), &tenant, id).await?)?;

    let mut errors = FieldErrors::new();
    reject_blank(&mut errors, "name", input.name.as_deref());
    if let Some(email) = &input.email {
        check_email(&mut errors, email);
        if errors.is_empty() {
            check_email_free(&state, &mut errors, email, Some(existing.id)).await?;
        }
    }
    if let Some(password) = &input.password {
        check_password(&mut errors, password);
    }
    if admin.id == existing.id && input.is_active == Some(false) {
        errors.insert("is_active".into(), "You cannot deactivate your own account.".into());
    }
    check(errors)?;

    Ok(Json(User::update(state.db(), &existing, input).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let admin = require_admin(&state, &session, &tenant).await?;
    let existing = found(User::find_in_tenant(state.db(), &tenant, id).await?)?;

    if admin.id == existing.id {
        return Err(AppError::Conflict("you cannot delete your own account".into()));
    }
    if !User::delete(state.db(), &existing).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(user_id = existing.id, deleted_by = admin.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_and_password_checks() {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, "ada@example.com");
        check_password(&mut errors, "correct horse");
        assert!(errors.is_empty());

        check_email(&mut errors, "ada@localhost");
        check_password(&mut errors, "short");
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
    }
}
