//! Page model. Pages own their sections; deleting a page cascades.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_query::Order;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::listing::{ListFilters, ListQuery, Paginated};
use super::ordering::{self, OrderScope};
use crate::services::slug::{available_slug, existing_slugs, unique_slug, updated_slug};
use crate::tenant::TenantContext;

const TABLE: &str = "pages";
const SEARCH_COLUMNS: &[&str] = &["title", "slug"];

/// Page record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Page {
    pub id: i64,
    pub tenant_id: i64,
    pub title: String,
    pub slug: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub is_published: bool,
    pub is_homepage: bool,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePage {
    pub title: String,
    pub slug: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub is_published: Option<bool>,
    pub is_homepage: Option<bool>,
}

/// Input for updating a page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePage {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub is_published: Option<bool>,
    pub is_homepage: Option<bool>,
}

fn scope(tenant_id: i64) -> OrderScope {
    OrderScope::new(TABLE, "tenant_id", tenant_id)
}

impl Page {
    fn query(tenant: &TenantContext, filters: &ListFilters) -> ListQuery {
        ListQuery::new(TABLE, tenant.id)
            .search(SEARCH_COLUMNS, filters.search.as_deref())
            .filter_eq("is_published", filters.is_published)
            .order_by("sort_order", Order::Asc)
    }

    pub async fn list(pool: &PgPool, tenant: &TenantContext, filters: &ListFilters) -> Result<Vec<Self>> {
        Self::query(tenant, filters).fetch_all(pool).await
    }

    pub async fn paginate(
        pool: &PgPool,
        tenant: &TenantContext,
        filters: &ListFilters,
    ) -> Result<Paginated<Self>> {
        Self::query(tenant, filters)
            .fetch_page(pool, filters.page_request())
            .await
    }

    pub async fn find_by_id(pool: &PgPool, tenant: &TenantContext, id: i64) -> Result<Option<Self>> {
        let page = sqlx::query_as::<_, Self>("SELECT * FROM pages WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant.id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch page")?;

        Ok(page)
    }

    pub async fn find_by_slug(pool: &PgPool, tenant: &TenantContext, slug: &str) -> Result<Option<Self>> {
        let page =
            sqlx::query_as::<_, Self>("SELECT * FROM pages WHERE slug = $1 AND tenant_id = $2")
                .bind(slug)
                .bind(tenant.id)
                .fetch_optional(pool)
                .await
                .context("failed to fetch page by slug")?;

        Ok(page)
    }

    /// The tenant's published homepage, if one is flagged.
    pub async fn homepage(pool: &PgPool, tenant: &TenantContext) -> Result<Option<Self>> {
        let page = sqlx::query_as::<_, Self>(
            "SELECT * FROM pages WHERE tenant_id = $1 AND is_homepage AND is_published LIMIT 1",
        )
        .bind(tenant.id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch homepage")?;

        Ok(page)
    }

    /// Create a page at the end of the tenant's page order.
    pub async fn create(pool: &PgPool, tenant: &TenantContext, input: CreatePage) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin page create")?;

        let source = input.slug.as_deref().unwrap_or(&input.title);
        let slug = available_slug(&mut *tx, TABLE, Some(tenant.id), source).await?;
        let order = ordering::next_order(&mut *tx, scope(tenant.id)).await?;
        let is_homepage = input.is_homepage.unwrap_or(false);
        if is_homepage {
            clear_homepage(&mut tx, tenant.id).await?;
        }

        let page = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO pages (tenant_id, title, slug, meta_title, meta_description,
                               is_published, is_homepage, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(tenant.id)
        .bind(&input.title)
        .bind(&slug)
        .bind(&input.meta_title)
        .bind(&input.meta_description)
        .bind(input.is_published.unwrap_or(false))
        .bind(is_homepage)
        .bind(order)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create page")?;

        tx.commit().await.context("failed to commit page create")?;
        Ok(page)
    }

    /// Merge `input` over `existing`.
    pub async fn update(pool: &PgPool, existing: &Self, input: UpdatePage) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin page update")?;

        let slug = updated_slug(
            &mut tx,
            TABLE,
            existing.tenant_id,
            &existing.slug,
            input.slug.as_deref(),
        )
        .await?;
        let is_homepage = input.is_homepage.unwrap_or(existing.is_homepage);
        if is_homepage && !existing.is_homepage {
            clear_homepage(&mut tx, existing.tenant_id).await?;
        }

        let page = sqlx::query_as::<_, Self>(
            r#"
            UPDATE pages
            SET title = $1, slug = $2, meta_title = $3, meta_description = $4,
                is_published = $5, is_homepage = $6, updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(input.title.as_deref().unwrap_or(&existing.title))
        .bind(&slug)
        .bind(input.meta_title.or_else(|| existing.meta_title.clone()))
        .bind(input.meta_description.or_else(|| existing.meta_description.clone()))
        .bind(input.is_published.unwrap_or(existing.is_published))
        .bind(is_homepage)
        .bind(existing.id)
        .fetch_one(&mut *tx)
        .await
        .context("failed to update page")?;

        tx.commit().await.context("failed to commit page update")?;
        Ok(page)
    }

    /// Delete a page and its sections, closing the gap in page order.
    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<bool> {
        let mut tx = pool.begin().await.context("failed to begin page delete")?;

        let result = sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(existing.id)
            .execute(&mut *tx)
            .await
            .context("failed to delete page")?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        ordering::compact_after_delete(&mut *tx, scope(existing.tenant_id), existing.sort_order)
            .await?;

        tx.commit().await.context("failed to commit page delete")?;
        Ok(true)
    }

    /// Flip the published flag.
    pub async fn toggle_published(pool: &PgPool, existing: &Self) -> Result<Self> {
        let page = sqlx::query_as::<_, Self>(
            "UPDATE pages SET is_published = NOT is_published, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to toggle page")?;

        Ok(page)
    }

    /// Copy a page and all of its sections.
    ///
    /// The copy is unpublished, never the homepage, gets slug
    /// `<slug>-copy[-n]` and lands right after the source in page order.
    pub async fn duplicate(pool: &PgPool, existing: &Self) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin page duplicate")?;

        let base = format!("{}-copy", existing.slug);
        let taken = existing_slugs(&mut *tx, TABLE, Some(existing.tenant_id), &base).await?;
        let slug = unique_slug(&base, |s| taken.contains(s));
        ordering::shift_after(&mut *tx, scope(existing.tenant_id), existing.sort_order).await?;

        let page = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO pages (tenant_id, title, slug, meta_title, meta_description,
                               is_published, is_homepage, sort_order)
            VALUES ($1, $2, $3, $4, $5, FALSE, FALSE, $6)
            RETURNING *
            "#,
        )
        .bind(existing.tenant_id)
        .bind(format!("{} (Copy)", existing.title))
        .bind(&slug)
        .bind(&existing.meta_title)
        .bind(&existing.meta_description)
        .bind(existing.sort_order + 1)
        .fetch_one(&mut *tx)
        .await
        .context("failed to duplicate page")?;

        sqlx::query(
            r#"
            INSERT INTO sections (tenant_id, page_id, component_type, sort_order, is_visible,
                                  content, styles, settings)
            SELECT tenant_id, $1, component_type, sort_order, is_visible, content, styles, settings
            FROM sections WHERE page_id = $2
            "#,
        )
        .bind(page.id)
        .bind(existing.id)
        .execute(&mut *tx)
        .await
        .context("failed to duplicate page sections")?;

        tx.commit().await.context("failed to commit page duplicate")?;
        Ok(page)
    }

    /// Reorder the tenant's pages. Returns false when `ids` is not a
    /// permutation of the tenant's page ids.
    pub async fn reorder(pool: &PgPool, tenant: &TenantContext, ids: &[i64]) -> Result<bool> {
        ordering::reorder(pool, scope(tenant.id), ids).await
    }
}

async fn clear_homepage(conn: &mut sqlx::PgConnection, tenant_id: i64) -> Result<()> {
    sqlx::query("UPDATE pages SET is_homepage = FALSE WHERE tenant_id = $1 AND is_homepage")
        .bind(tenant_id)
        .execute(conn)
        .await
        .context("failed to clear homepage flag")?;
    Ok(())
}
