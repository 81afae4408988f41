//! Tenant model: an isolated customer account owning all other content.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use super::listing::{PageRequest, Paginated, escape_like_wildcards};
use crate::services::slug::available_slug;

/// Tenant record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    pub is_active: bool,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a tenant. The slug is derived from the name when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub slug: Option<String>,
    pub domain: Option<String>,
    pub is_active: Option<bool>,
    pub settings: Option<serde_json::Value>,
}

/// Input for updating a tenant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub is_active: Option<bool>,
    pub settings: Option<serde_json::Value>,
}

impl Tenant {
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<Option<Self>> {
        let tenant = sqlx::query_as::<_, Self>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .context("failed to fetch tenant by id")?;

        Ok(tenant)
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>> {
        let tenant = sqlx::query_as::<_, Self>("SELECT * FROM tenants WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await
            .context("failed to fetch tenant by slug")?;

        Ok(tenant)
    }

    /// Find an active tenant by its public domain (case-insensitive).
    pub async fn find_by_domain(pool: &PgPool, domain: &str) -> Result<Option<Self>> {
        let tenant = sqlx::query_as::<_, Self>(
            "SELECT * FROM tenants WHERE LOWER(domain) = LOWER($1) AND is_active",
        )
        .bind(domain)
        .fetch_optional(pool)
        .await
        .context("failed to fetch tenant by domain")?;

        Ok(tenant)
    }

    /// All tenants, optionally filtered by name/slug substring.
    pub async fn list(pool: &PgPool, search: Option<&str>) -> Result<Vec<Self>> {
        let tenants = match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => {
                let pattern = format!("%{}%", escape_like_wildcards(term));
                sqlx::query_as::<_, Self>(
                    "SELECT * FROM tenants WHERE name ILIKE $1 OR slug ILIKE $1 ORDER BY name, id",
                )
                .bind(pattern)
                .fetch_all(pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Self>("SELECT * FROM tenants ORDER BY name, id")
                    .fetch_all(pool)
                    .await
            }
        }
        .context("failed to list tenants")?;

        Ok(tenants)
    }

    /// One page of tenants.
    ///
    /// Tenants are not tenant-scoped, so this pages in memory over [`Tenant::list`].
    pub async fn paginate(
        pool: &PgPool,
        search: Option<&str>,
        request: PageRequest,
    ) -> Result<Paginated<Self>> {
        let all = Self::list(pool, search).await?;
        let total = i64::try_from(all.len()).unwrap_or(i64::MAX);
        let start = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(request.per_page).unwrap_or(usize::MAX);
        let data = all.into_iter().skip(start).take(take).collect();
        Ok(Paginated::new(data, total, request))
    }

    /// Create a tenant with a unique slug.
    pub async fn create(pool: &PgPool, input: CreateTenant) -> Result<Self> {
        let source = input.slug.as_deref().unwrap_or(&input.name);
        let slug = available_slug(pool, "tenants", None, source).await?;

        let tenant = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO tenants (name, slug, domain, is_active, settings)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&slug)
        .bind(input.domain.as_deref().map(str::to_ascii_lowercase))
        .bind(input.is_active.unwrap_or(true))
        .bind(input.settings.unwrap_or_else(|| serde_json::json!({})))
        .fetch_one(pool)
        .await
        .context("failed to create tenant")?;

        Ok(tenant)
    }

    /// Update a tenant. The slug never changes.
    pub async fn update(pool: &PgPool, existing: &Self, input: UpdateTenant) -> Result<Self> {
        let name = input.name.unwrap_or_else(|| existing.name.clone());
        let domain = input
            .domain
            .map(|d| d.to_ascii_lowercase())
            .or_else(|| existing.domain.clone());
        let is_active = input.is_active.unwrap_or(existing.is_active);
        let settings = input.settings.unwrap_or_else(|| existing.settings.clone());

        let tenant = sqlx::query_as::<_, Self>(
            r#"
            UPDATE tenants
            SET name = $1, domain = $2, is_active = $3, settings = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&name)
        .bind(&domain)
        .bind(is_active)
        .bind(&settings)
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to update tenant")?;

        Ok(tenant)
    }

    /// Whether another tenant, active or not, already owns `domain`.
    pub async fn domain_taken(pool: &PgPool, domain: &str, except: Option<i64>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM tenants WHERE domain = $1 AND id <> COALESCE($2, 0))",
        )
        .bind(domain.to_ascii_lowercase())
        .bind(except)
        .fetch_one(pool)
        .await
        .context("failed to check tenant domain")?;

        Ok(taken)
    }

    /// Delete a tenant and, by cascade, all of its content.
    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(existing.id)
            .execute(pool)
            .await
            .context("failed to delete tenant")?;

        Ok(result.rows_affected() > 0)
    }

    /// Row counts of cloneable content owned by this tenant.
    pub async fn content_counts(pool: &PgPool, tenant_id: i64) -> Result<ContentCounts> {
        let counts = sqlx::query_as::<_, ContentCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM pages WHERE tenant_id = $1) AS pages,
                (SELECT COUNT(*) FROM sections WHERE tenant_id = $1) AS sections,
                (SELECT COUNT(*) FROM service_categories WHERE tenant_id = $1) AS service_categories,
                (SELECT COUNT(*) FROM services WHERE tenant_id = $1) AS services,
                (SELECT COUNT(*) FROM team_members WHERE tenant_id = $1) AS team_members,
                (SELECT COUNT(*) FROM testimonials WHERE tenant_id = $1) AS testimonials,
                (SELECT COUNT(*) FROM faqs WHERE tenant_id = $1) AS faqs,
                (SELECT COUNT(*) FROM menus WHERE tenant_id = $1) AS menus,
                (SELECT COUNT(*) FROM settings WHERE tenant_id = $1) AS settings
            "#,
        )
        .bind(tenant_id)
        .fetch_one(pool)
        .await
        .context("failed to count tenant content")?;

        Ok(counts)
    }
}

/// Per-entity content totals for one tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ContentCounts {
    pub pages: i64,
    pub sections: i64,
    pub service_categories: i64,
    pub services: i64,
    pub team_members: i64,
    pub testimonials: i64,
    pub faqs: i64,
    pub menus: i64,
    pub settings: i64,
}
