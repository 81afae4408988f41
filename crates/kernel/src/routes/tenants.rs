//! Tenant management API routes. Super admin only.
//!
//! These routes are not tenant-scoped: they address tenants by id and
//! live outside the tenant resolution layer.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::deploy::validate;
use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{ContentCounts, CreateTenant, PageRequest, Paginated, Tenant, UpdateTenant};
use crate::routes::helpers::{check, found, reject_blank, require_super_admin, require_text};
use crate::services::events::{ContentAction, ContentEvent};
use crate::services::tenant_clone::{CloneError, CloneOptions, CloneReport, clone_tenant_content};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tenants", get(list_tenants).post(create_tenant))
        .route(
            "/api/tenants/{id}",
            get(get_tenant).put(update_tenant).delete(delete_tenant),
        )
        .route("/api/tenants/{id}/clone", post(clone_into))
        .route("/api/tenants/{id}/stats", get(tenant_stats))
}

#[derive(Debug, Deserialize)]
struct TenantQuery {
    search: Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
}

/// Creation body: the tenant plus an optional content clone.
#[derive(Debug, Deserialize)]
struct CreateTenantRequest {
    #[serde(flatten)]
    tenant: CreateTenant,
    /// Copy the master tenant's content into the new tenant.
    #[serde(default)]
    clone_content: bool,
    #[serde(default)]
    skip_existing: bool,
}

#[derive(Debug, Default, Deserialize)]
struct CloneRequest {
    /// Defaults to the master tenant.
    source_tenant_id: Option<i64>,
    #[serde(default)]
    skip_existing: bool,
}

#[derive(Debug, Serialize)]
struct CreatedTenant {
    tenant: Tenant,
    #[serde(skip_serializing_if = "Option::is_none")]
    clone: Option<CloneReport>,
}

#[derive(Debug, Serialize)]
struct TenantStats {
    tenant_id: i64,
    counts: ContentCounts,
}

fn clone_error(error: CloneError) -> AppError {
    match error {
        CloneError::SourceNotFound(id) => {
            AppError::field("source_tenant_id", format!("Tenant {id} does not exist."))
        }
        CloneError::SameTenant => {
            AppError::field("source_tenant_id", "A tenant cannot be cloned into itself.")
        }
        e @ (CloneError::OrphanSection { .. } | CloneError::OrphanService { .. }) => {
            AppError::Conflict(e.to_string())
        }
        CloneError::Internal(e) => AppError::Internal(e),
    }
}

/// Run a clone and report it through metrics and events.
async fn run_clone(
    state: &AppState,
    target: &Tenant,
    options: CloneOptions,
) -> AppResult<CloneReport> {
    let result = clone_tenant_content(state.db(), target, options).await;
    state.metrics().record_clone(result.is_ok());

    match result {
        Ok(report) => {
            info!(
                target_tenant_id = target.id,
                source_tenant_id = options.source_tenant_id,
                created = report.total_created(),
                "tenant content cloned"
            );
            state.emit(
                ContentEvent::new(target.id, "tenant", target.id, ContentAction::Cloned)
                    .with_slug(&target.slug),
            );
            Ok(report)
        }
        Err(e) => {
            warn!(target_tenant_id = target.id, error = %e, "tenant clone failed");
            Err(clone_error(e))
        }
    }
}

async fn check_domain(
    state: &AppState,
    errors: &mut FieldErrors,
    domain: Option<&str>,
    except: Option<i64>,
) -> AppResult<()> {
    let Some(domain) = domain.filter(|d| !d.is_empty()) else {
        return Ok(());
    };
    match validate::domain(domain) {
        Ok(domain) => {
            if Tenant::domain_taken(state.db(), &domain, except).await? {
                errors.insert("domain".into(), "The domain is already in use.".into());
            }
        }
        Err(e) => {
            errors.insert("domain".into(), e.to_string());
        }
    }
    Ok(())
}

async fn list_tenants(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<TenantQuery>,
) -> AppResult<Json<Paginated<Tenant>>> {
    require_super_admin(&state, &session).await?;
    let request = PageRequest::new(query.page, query.per_page);
    Ok(Json(
        Tenant::paginate(state.db(), query.search.as_deref(), request).await?,
    ))
}

async fn get_tenant(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Tenant>> {
    require_super_admin(&state, &session).await?;
    Ok(Json(found(Tenant::find_by_id(state.db(), id).await?)?))
}

/// Create a tenant, optionally seeding it with master content.
///
/// A failed clone leaves the tenant in place (the clone itself rolls back)
/// and is reported as the request error.
async fn create_tenant(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<CreateTenantRequest>,
) -> AppResult<(StatusCode, Json<CreatedTenant>)> {
    require_super_admin(&state, &session).await?;

    let mut errors = FieldErrors::new();
    require_text(&mut errors, "name", Some(&input.tenant.name));
    if let Some(slug) = input.tenant.slug.as_deref()
        && validate::slug(slug).is_err()
    {
        errors.insert("slug".into(), "The slug may contain a-z, 0-9 and '-'.".into());
    }
    check_domain(&state, &mut errors, input.tenant.domain.as_deref(), None).await?;
    check(errors)?;

    let tenant = Tenant::create(state.db(), input.tenant).await?;
    info!(tenant_id = tenant.id, slug = %tenant.slug, "tenant created");
    state.tenants().invalidate_all();

    let clone = if input.clone_content {
        let options = CloneOptions {
            source_tenant_id: state.config().master_tenant_id,
            skip_existing: input.skip_existing,
        };
        Some(run_clone(&state, &tenant, options).await?)
    } else {
        None
    };

    Ok((StatusCode::CREATED, Json(CreatedTenant { tenant, clone })))
}

async fn update_tenant(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTenant>,
) -> AppResult<Json<Tenant>> {
    require_super_admin(&state, &session).await?;
    let existing = found(Tenant::find_by_id(state.db(), id).await?)?;

    let mut errors = FieldErrors::new();
    reject_blank(&mut errors, "name", input.name.as_deref());
    check_domain(&state, &mut errors, input.domain.as_deref(), Some(existing.id)).await?;
    if existing.id == state.config().master_tenant_id && input.is_active == Some(false) {
        errors.insert("is_active".into(), "The master tenant cannot be deactivated.".into());
    }
    check(errors)?;

    let tenant = Tenant::update(state.db(), &existing, input).await?;
    state.tenants().invalidate_all();
    state.emit(
        ContentEvent::new(tenant.id, "tenant", tenant.id, ContentAction::Updated)
            .with_slug(&tenant.slug),
    );
    Ok(Json(tenant))
}

async fn delete_tenant(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_super_admin(&state, &session).await?;
    let existing = found(Tenant::find_by_id(state.db(), id).await?)?;

    if existing.id == state.config().master_tenant_id {
        return Err(AppError::Conflict("the master tenant cannot be deleted".into()));
    }
    if !Tenant::delete(state.db(), &existing).await? {
        return Err(AppError::NotFound);
    }

    info!(tenant_id = existing.id, "tenant deleted");
    state.tenants().invalidate_all();
    state.emit(
        ContentEvent::new(existing.id, "tenant", existing.id, ContentAction::Deleted)
            .with_slug(&existing.slug),
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn clone_into(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    body: Option<Json<CloneRequest>>,
) -> AppResult<Json<CloneReport>> {
    require_super_admin(&state, &session).await?;
    let target = found(Tenant::find_by_id(state.db(), id).await?)?;

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let options = CloneOptions {
        source_tenant_id: request
            .source_tenant_id
            .unwrap_or(state.config().master_tenant_id),
        skip_existing: request.skip_existing,
    };

    Ok(Json(run_clone(&state, &target, options).await?))
}

async fn tenant_stats(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<TenantStats>> {
    require_super_admin(&state, &session).await?;
    let tenant = found(Tenant::find_by_id(state.db(), id).await?)?;

    Ok(Json(TenantStats {
        tenant_id: tenant.id,
        counts: Tenant::content_counts(state.db(), tenant.id).await?,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clone_errors_map_to_statuses() {
        assert!(matches!(
            clone_error(CloneError::SameTenant),
            AppError::Validation(_)
        ));
        assert!(matches!(
            clone_error(CloneError::SourceNotFound(9)),
            AppError::Validation(_)
        ));
        assert!(matches!(
            clone_error(CloneError::OrphanSection {
                section_id: 1,
                page_id: 2
            }),
            AppError::Conflict(_)
        ));
    }

    #[test]
    fn create_request_flattens_the_tenant() {
        let request: CreateTenantRequest = serde_json::from_value(serde_json::json!({
            "name": "Acme",
            "domain": "acme.example",
            "clone_content": true
        }))
        .unwrap();
        assert_eq!(request.tenant.name, "Acme");
        assert!(request.clone_content);
        assert!(!request.skip_existing);
    }
}
