//! Shared route helpers: authorization, lookups and input checks.

use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::User;
use crate::session::SESSION_USER_ID;
use crate::state::AppState;
use crate::tenant::TenantContext;

/// Body of every reorder endpoint: ids in their new order.
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<i64>,
}

/// The logged-in, active user, or 401.
pub async fn current_user(state: &AppState, session: &Session) -> AppResult<User> {
    let user_id: Option<i64> = session
        .get(SESSION_USER_ID)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("session read failed: {e}")))?;

    let Some(id) = user_id else {
        return Err(AppError::Unauthorized);
    };

    match User::find_by_id(state.db(), id).await? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(AppError::Unauthorized),
    }
}

/// Whether `user` may manage content of `tenant`. Admins of the master
/// tenant manage every tenant.
pub fn can_manage(user: &User, tenant: &TenantContext, master_tenant_id: i64) -> bool {
    user.tenant_id == tenant.id || (user.tenant_id == master_tenant_id && user.is_admin())
}

/// Require a user allowed to edit `tenant`'s content.
pub async fn require_editor(
    state: &AppState,
    session: &Session,
    tenant: &TenantContext,
) -> AppResult<User> {
    let user = current_user(state, session).await?;
    if !can_manage(&user, tenant, state.config().master_tenant_id) {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

/// Require an admin of `tenant` (users, webhooks, settings).
pub async fn require_admin(
    state: &AppState,
    session: &Session,
    tenant: &TenantContext,
) -> AppResult<User> {
    let user = require_editor(state, session, tenant).await?;
    if !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

/// Require an admin of the master tenant (tenant management, deploys).
pub async fn require_super_admin(state: &AppState, session: &Session) -> AppResult<User> {
    let user = current_user(state, session).await?;
    if user.tenant_id != state.config().master_tenant_id || !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

/// Turn a missing row into 404.
pub fn found<T>(row: Option<T>) -> AppResult<T> {
    row.ok_or(AppError::NotFound)
}

/// Turn a non-empty error map into a validation error.
pub fn check(errors: FieldErrors) -> AppResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Record an error for `field` when `value` is blank.
pub fn require_text(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    if value.is_none_or(|v| v.trim().is_empty()) {
        errors.insert(field.to_string(), format!("The {field} field is required."));
    }
}

/// Record an error for `field` when a supplied update value is blank.
pub fn reject_blank(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    if value.is_some_and(|v| v.trim().is_empty()) {
        errors.insert(field.to_string(), format!("The {field} field cannot be empty."));
    }
}

/// Map a failed reorder (ids not matching the collection) to 422.
pub fn reordered(applied: bool) -> AppResult<()> {
    if applied {
        Ok(())
    } else {
        Err(AppError::field(
            "ids",
            "The ids must list every item of the collection exactly once.",
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(tenant_id: i64, role: &str) -> User {
        User {
            id: 1,
            tenant_id,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            role: role.into(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn tenant_users_manage_their_own_tenant() {
        let acme = TenantContext::new(2, "acme", "Acme");
        let other = TenantContext::new(3, "other", "Other");

        assert!(can_manage(&user(2, "editor"), &acme, 1));
        assert!(!can_manage(&user(2, "admin"), &other, 1));
    }

    #[test]
    fn master_admins_manage_every_tenant() {
        let acme = TenantContext::new(2, "acme", "Acme");
        assert!(can_manage(&user(1, "admin"), &acme, 1));
        assert!(!can_manage(&user(1, "editor"), &acme, 1));
    }

    #[test]
    fn text_checks() {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "title", Some("  "));
        require_text(&mut errors, "slug", None);
        require_text(&mut errors, "name", Some("ok"));
        reject_blank(&mut errors, "question", Some(""));
        reject_blank(&mut errors, "answer", None);

        assert_eq!(
            errors.keys().map(String::as_str).collect::<Vec<_>>(),
            ["question", "slug", "title"]
        );
        assert!(check(errors).is_err());
        assert!(check(FieldErrors::new()).is_ok());
    }

    #[test]
    fn reorder_mismatch_is_a_validation_error() {
        assert!(reordered(true).is_ok());
        assert!(matches!(reordered(false), Err(AppError::Validation(_))));
    }
}
