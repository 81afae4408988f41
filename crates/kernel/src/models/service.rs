//! Services and the categories that group them.
//!
//! Categories are ordered per tenant; services are ordered within their
//! category. A category cannot be deleted while services reference it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_query::Order;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::listing::{ListFilters, ListQuery, PageRequest, Paginated};
use super::ordering::{self, OrderScope};
use crate::services::slug::{available_slug, updated_slug};
use crate::tenant::TenantContext;

/// Service category record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceCategory {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateServiceCategory {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
}

/// Input for updating a category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateServiceCategory {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

/// Result of a delete that may be refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// Rows still reference the target.
    HasDependents(i64),
}

fn category_scope(tenant_id: i64) -> OrderScope {
    OrderScope::new("service_categories", "tenant_id", tenant_id)
}

fn service_scope(category_id: i64) -> OrderScope {
    OrderScope::new("services", "category_id", category_id)
}

impl ServiceCategory {
    pub async fn list(pool: &PgPool, tenant: &TenantContext, filters: &ListFilters) -> Result<Vec<Self>> {
        ListQuery::new("service_categories", tenant.id)
            .search(&["name", "slug"], filters.search.as_deref())
            .order_by("sort_order", Order::Asc)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, tenant: &TenantContext, id: i64) -> Result<Option<Self>> {
        let category = sqlx::query_as::<_, Self>(
            "SELECT * FROM service_categories WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant.id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch service category")?;

        Ok(category)
    }

    pub async fn create(
        pool: &PgPool,
        tenant: &TenantContext,
        input: CreateServiceCategory,
    ) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin category create")?;

        let source = input.slug.as_deref().unwrap_or(&input.name);
        let slug = available_slug(&mut *tx, "service_categories", Some(tenant.id), source).await?;
        let order = ordering::next_order(&mut *tx, category_scope(tenant.id)).await?;

        let category = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO service_categories (tenant_id, name, slug, description, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant.id)
        .bind(&input.name)
        .bind(&slug)
        .bind(&input.description)
        .bind(order)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create service category")?;

        tx.commit().await.context("failed to commit category create")?;
        Ok(category)
    }

    pub async fn update(pool: &PgPool, existing: &Self, input: UpdateServiceCategory) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin category update")?;
        let slug = updated_slug(
            &mut tx,
            "service_categories",
            existing.tenant_id,
            &existing.slug,
            input.slug.as_deref(),
        )
        .await?;

        let category = sqlx::query_as::<_, Self>(
            r#"
            UPDATE service_categories
            SET name = $1, slug = $2, description = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(input.name.as_deref().unwrap_or(&existing.name))
        .bind(&slug)
        .bind(input.description.or_else(|| existing.description.clone()))
        .bind(existing.id)
        .fetch_one(&mut *tx)
        .await
        .context("failed to update service category")?;

        tx.commit().await.context("failed to commit category update")?;
        Ok(category)
    }

    /// Delete a category unless services still reference it.
    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<DeleteOutcome> {
        let mut tx = pool.begin().await.context("failed to begin category delete")?;

        let dependents: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM services WHERE category_id = $1")
                .bind(existing.id)
                .fetch_one(&mut *tx)
                .await
                .context("failed to count category services")?;
        if dependents > 0 {
            return Ok(DeleteOutcome::HasDependents(dependents));
        }

        let result = sqlx::query("DELETE FROM service_categories WHERE id = $1")
            .bind(existing.id)
            .execute(&mut *tx)
            .await
            .context("failed to delete service category")?;
        if result.rows_affected() == 0 {
            return Ok(DeleteOutcome::NotFound);
        }
        ordering::compact_after_delete(
            &mut *tx,
            category_scope(existing.tenant_id),
            existing.sort_order,
        )
        .await?;

        tx.commit().await.context("failed to commit category delete")?;
        Ok(DeleteOutcome::Deleted)
    }

    pub async fn reorder(pool: &PgPool, tenant: &TenantContext, ids: &[i64]) -> Result<bool> {
        ordering::reorder(pool, category_scope(tenant.id), ids).await
    }
}

/// Service record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub tenant_id: i64,
    pub category_id: i64,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_featured: bool,
    pub is_published: bool,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateService {
    pub category_id: i64,
    pub title: String,
    pub slug: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_featured: Option<bool>,
    pub is_published: Option<bool>,
}

/// Input for updating a service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateService {
    pub category_id: Option<i64>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_featured: Option<bool>,
    pub is_published: Option<bool>,
}

/// Service list filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceFilters {
    pub search: Option<String>,
    pub is_published: Option<bool>,
    pub is_featured: Option<bool>,
    pub category_id: Option<i64>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl Service {
    fn query(tenant: &TenantContext, filters: &ServiceFilters) -> ListQuery {
        ListQuery::new("services", tenant.id)
            .search(&["title", "summary"], filters.search.as_deref())
            .filter_eq("is_published", filters.is_published)
            .filter_eq("is_featured", filters.is_featured)
            .filter_eq("category_id", filters.category_id)
            .order_by("category_id", Order::Asc)
            .order_by("sort_order", Order::Asc)
    }

    pub async fn list(pool: &PgPool, tenant: &TenantContext, filters: &ServiceFilters) -> Result<Vec<Self>> {
        Self::query(tenant, filters).fetch_all(pool).await
    }

    pub async fn paginate(
        pool: &PgPool,
        tenant: &TenantContext,
        filters: &ServiceFilters,
    ) -> Result<Paginated<Self>> {
        Self::query(tenant, filters)
            .fetch_page(pool, PageRequest::new(filters.page, filters.per_page))
            .await
    }

    pub async fn find_by_id(pool: &PgPool, tenant: &TenantContext, id: i64) -> Result<Option<Self>> {
        let service =
            sqlx::query_as::<_, Self>("SELECT * FROM services WHERE id = $1 AND tenant_id = $2")
                .bind(id)
                .bind(tenant.id)
                .fetch_optional(pool)
                .await
                .context("failed to fetch service")?;

        Ok(service)
    }

    pub async fn find_by_slug(pool: &PgPool, tenant: &TenantContext, slug: &str) -> Result<Option<Self>> {
        let service = sqlx::query_as::<_, Self>(
            "SELECT * FROM services WHERE slug = $1 AND tenant_id = $2",
        )
        .bind(slug)
        .bind(tenant.id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch service by slug")?;

        Ok(service)
    }

    /// Create a service at the end of `category`.
    pub async fn create(
        pool: &PgPool,
        category: &ServiceCategory,
        input: CreateService,
    ) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin service create")?;

        let source = input.slug.as_deref().unwrap_or(&input.title);
        let slug = available_slug(&mut *tx, "services", Some(category.tenant_id), source).await?;
        let order = ordering::next_order(&mut *tx, service_scope(category.id)).await?;

        let service = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO services (tenant_id, category_id, title, slug, summary, description,
                                  icon, image, is_featured, is_published, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(category.tenant_id)
        .bind(category.id)
        .bind(&input.title)
        .bind(&slug)
        .bind(&input.summary)
        .bind(&input.description)
        .bind(&input.icon)
        .bind(&input.image)
        .bind(input.is_featured.unwrap_or(false))
        .bind(input.is_published.unwrap_or(true))
        .bind(order)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create service")?;

        tx.commit().await.context("failed to commit service create")?;
        Ok(service)
    }

    /// Merge `input` over `existing`.
    ///
    /// Moving to `new_category` appends the service there and closes the gap
    /// it left in the old category.
    pub async fn update(
        pool: &PgPool,
        existing: &Self,
        new_category: Option<&ServiceCategory>,
        input: UpdateService,
    ) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin service update")?;

        let slug = updated_slug(
            &mut tx,
            "services",
            existing.tenant_id,
            &existing.slug,
            input.slug.as_deref(),
        )
        .await?;

        let (category_id, order) = match new_category {
            Some(category) if category.id != existing.category_id => {
                let order = ordering::next_order(&mut *tx, service_scope(category.id)).await?;
                ordering::compact_after_delete(
                    &mut *tx,
                    service_scope(existing.category_id),
                    existing.sort_order,
                )
                .await?;
                (category.id, order)
            }
            _ => (existing.category_id, existing.sort_order),
        };

        let service = sqlx::query_as::<_, Self>(
            r#"
            UPDATE services
            SET category_id = $1, title = $2, slug = $3, summary = $4, description = $5,
                icon = $6, image = $7, is_featured = $8, is_published = $9, sort_order = $10,
                updated_at = NOW()
            WHERE id = $11
            RETURNING *
            "#,
        )
        .bind(category_id)
        .bind(input.title.as_deref().unwrap_or(&existing.title))
        .bind(&slug)
        .bind(input.summary.or_else(|| existing.summary.clone()))
        .bind(input.description.or_else(|| existing.description.clone()))
        .bind(input.icon.or_else(|| existing.icon.clone()))
        .bind(input.image.or_else(|| existing.image.clone()))
        .bind(input.is_featured.unwrap_or(existing.is_featured))
        .bind(input.is_published.unwrap_or(existing.is_published))
        .bind(order)
        .bind(existing.id)
        .fetch_one(&mut *tx)
        .await
        .context("failed to update service")?;

        tx.commit().await.context("failed to commit service update")?;
        Ok(service)
    }

    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<bool> {
        let mut tx = pool.begin().await.context("failed to begin service delete")?;

        let result = sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(existing.id)
            .execute(&mut *tx)
            .await
            .context("failed to delete service")?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        ordering::compact_after_delete(
            &mut *tx,
            service_scope(existing.category_id),
            existing.sort_order,
        )
        .await?;

        tx.commit().await.context("failed to commit service delete")?;
        Ok(true)
    }

    pub async fn toggle_published(pool: &PgPool, existing: &Self) -> Result<Self> {
        let service = sqlx::query_as::<_, Self>(
            "UPDATE services SET is_published = NOT is_published, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to toggle service")?;

        Ok(service)
    }

    /// Reorder the services of one category.
    pub async fn reorder(pool: &PgPool, category: &ServiceCategory, ids: &[i64]) -> Result<bool> {
        ordering::reorder(pool, service_scope(category.id), ids).await
    }
}
