//! Tenant deployment API route. Super admin only.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::deploy::{DeployOptions, DeployOutcome, DeployTarget};
use crate::error::{AppError, AppResult};
use crate::models::Tenant;
use crate::routes::helpers::{found, require_super_admin};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/tenants/{id}/deploy", post(deploy_tenant))
}

#[derive(Debug, Default, Deserialize)]
struct DeployRequest {
    /// Defaults to the tenant's configured domain.
    domain: Option<String>,
    #[serde(flatten)]
    options: DeployOptions,
}

/// Generate and activate the tenant's NGINX site, optionally issuing a
/// certificate. Failures of `nginx` or `certbot` answer 502 with the
/// captured message.
async fn deploy_tenant(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    body: Option<Json<DeployRequest>>,
) -> AppResult<(StatusCode, Json<DeployOutcome>)> {
    let user = require_super_admin(&state, &session).await?;
    let tenant = found(Tenant::find_by_id(state.db(), id).await?)?;

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let Some(domain) = request.domain.or(tenant.domain.clone()) else {
        return Err(AppError::field(
            "domain",
            "The tenant has no domain; pass one explicitly.",
        ));
    };

    let target = DeployTarget {
        tenant_id: tenant.id,
        tenant_slug: tenant.slug.clone(),
        domain,
    };
    info!(
        tenant_id = tenant.id,
        domain = %target.domain,
        user_id = user.id,
        dry_run = request.options.dry_run,
        "deploy requested"
    );

    let outcome = state.deploy().deploy(&target, &request.options).await;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(outcome)))
}
