//! Session login and logout.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{Tenant, User};
use crate::routes::helpers::current_user;
use crate::session::SESSION_USER_ID;
use crate::state::AppState;

/// Create the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    success: bool,
    message: String,
}

/// The logged-in user with the tenant they belong to.
#[derive(Debug, Serialize)]
struct Me {
    user: User,
    tenant: Option<Tenant>,
    is_super_admin: bool,
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::Internal(anyhow::anyhow!("session store failed: {e}"))
}

/// POST /api/auth/login
///
/// Unknown emails, wrong passwords and inactive accounts all answer 401
/// with the same body.
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let email = request.email.trim().to_lowercase();
    let user = match User::find_by_email(state.db(), &email).await? {
        Some(user) if user.is_active && user.verify_password(&request.password) => user,
        _ => {
            warn!("failed login attempt");
            return Err(AppError::Unauthorized);
        }
    };

    // New id on login so a pre-auth session id cannot be reused.
    session.cycle_id().await.map_err(session_error)?;
    session
        .insert(SESSION_USER_ID, user.id)
        .await
        .map_err(session_error)?;

    info!(user_id = user.id, tenant_id = user.tenant_id, "user logged in");
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".to_string(),
    }))
}

/// POST /api/auth/logout
///
/// Deletes the session from Redis and clears the cookie.
async fn logout(session: Session) -> AppResult<Json<LoginResponse>> {
    let user_id: Option<i64> = session.get(SESSION_USER_ID).await.ok().flatten();

    session.delete().await.map_err(session_error)?;

    if let Some(user_id) = user_id {
        info!(user_id, "user logged out");
    }
    Ok(Json(LoginResponse {
        success: true,
        message: "Logout successful".to_string(),
    }))
}

async fn me(State(state): State<AppState>, session: Session) -> AppResult<Json<Me>> {
    let user = current_user(&state, &session).await?;
    let tenant = Tenant::find_by_id(state.db(), user.tenant_id).await?;
    let is_super_admin = user.tenant_id == state.config().master_tenant_id && user.is_admin();

    Ok(Json(Me {
        user,
        tenant,
        is_super_admin,
    }))
}
