//! Tenant resolution middleware.
//!
//! Reads `X-Tenant-Id`, `X-Tenant-Domain`, then `Host`, resolves the tenant
//! and stores a [`TenantContext`] in request extensions. Handlers take it
//! with `Extension<TenantContext>`.

use std::time::Duration;

use anyhow::Result;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use crate::error::AppError;
use crate::models::Tenant;
use crate::state::AppState;
use crate::tenant::{TenantContext, TenantLookup};

/// How long a resolved tenant stays cached.
const RESOLVE_TTL: Duration = Duration::from_secs(60);

/// Resolves lookups to tenants with a short-lived in-process cache.
#[derive(Clone)]
pub struct TenantResolver {
    master_tenant_id: i64,
    cache: Cache<TenantLookup, TenantContext>,
}

impl TenantResolver {
    pub fn new(master_tenant_id: i64) -> Self {
        Self {
            master_tenant_id,
            cache: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(RESOLVE_TTL)
                .build(),
        }
    }

    pub fn master_tenant_id(&self) -> i64 {
        self.master_tenant_id
    }

    /// Resolve `lookup`. `None` means an explicit id or domain matched no
    /// active tenant. Host and default lookups fall back to the master tenant.
    pub async fn resolve(&self, pool: &PgPool, lookup: TenantLookup) -> Result<Option<TenantContext>> {
        if let Some(hit) = self.cache.get(&lookup).await {
            return Ok(Some(hit));
        }

        let found = match &lookup {
            TenantLookup::Id(id) => Tenant::find_by_id(pool, *id).await?.filter(|t| t.is_active),
            TenantLookup::Domain(domain) | TenantLookup::Host(domain) => {
                Tenant::find_by_domain(pool, domain).await?
            }
            TenantLookup::Default => None,
        };

        let tenant = match found {
            Some(tenant) => Some(tenant),
            None if lookup.falls_back() => Tenant::find_by_id(pool, self.master_tenant_id).await?,
            None => None,
        };

        let Some(tenant) = tenant else {
            debug!(?lookup, "tenant not resolved");
            return Ok(None);
        };

        let context = TenantContext::from(&tenant);
        self.cache.insert(lookup, context.clone()).await;
        Ok(Some(context))
    }

    /// Drop every cached resolution. Called after tenant writes.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl std::fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantResolver")
            .field("master_tenant_id", &self.master_tenant_id)
            .finish()
    }
}

/// Middleware resolving the request's tenant.
///
/// Responds 404 when an explicit tenant id or domain is unknown.
pub async fn resolve_tenant(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let lookup = TenantLookup::from_headers(request.headers());

    match state.tenants().resolve(state.db(), lookup).await {
        Ok(Some(tenant)) => {
            request.extensions_mut().insert(tenant);
            next.run(request).await
        }
        Ok(None) => AppError::NotFound.into_response(),
        Err(e) => AppError::Internal(e.context("failed to resolve tenant")).into_response(),
    }
}
