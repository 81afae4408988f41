//! Frequently asked questions, ordered per tenant and optionally grouped by
//! a free-text category.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_query::Order;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::listing::{ListFilters, ListQuery, Paginated};
use super::ordering::{self, OrderScope};
use crate::tenant::TenantContext;

const TABLE: &str = "faqs";

/// FAQ record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Faq {
    pub id: i64,
    pub tenant_id: i64,
    pub question: String,
    pub answer: String,
    pub category: Option<String>,
    pub is_published: bool,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateFaq {
    pub question: String,
    pub answer: String,
    pub category: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFaq {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub category: Option<String>,
    pub is_published: Option<bool>,
}

fn scope(tenant_id: i64) -> OrderScope {
    OrderScope::new(TABLE, "tenant_id", tenant_id)
}

impl Faq {
    fn query(tenant: &TenantContext, filters: &ListFilters) -> ListQuery {
        ListQuery::new(TABLE, tenant.id)
            .search(&["question", "answer"], filters.search.as_deref())
            .filter_eq("is_published", filters.is_published)
            .filter_eq("category", filters.category.clone())
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

    /// Distinct FAQ categories of a tenant.
    pub async fn categories(pool: &PgPool, tenant: &TenantContext) -> Result<Vec<String>> {
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM faqs WHERE tenant_id = $1 AND category IS NOT NULL ORDER BY category",
        )
        .bind(tenant.id)
        .fetch_all(pool)
        .await
        .context("failed to list faq categories")?;

        Ok(categories)
    }

    pub async fn find_by_id(pool: &PgPool, tenant: &TenantContext, id: i64) -> Result<Option<Self>> {
        let faq = sqlx::query_as::<_, Self>("SELECT * FROM faqs WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant.id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch faq")?;

        Ok(faq)
    }

    pub async fn create(pool: &PgPool, tenant: &TenantContext, input: CreateFaq) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin faq create")?;
        let order = ordering::next_order(&mut *tx, scope(tenant.id)).await?;

        let faq = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO faqs (tenant_id, question, answer, category, is_published, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant.id)
        .bind(&input.question)
        .bind(&input.answer)
        .bind(&input.category)
        .bind(input.is_published.unwrap_or(true))
        .bind(order)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create faq")?;

        tx.commit().await.context("failed to commit faq create")?;
        Ok(faq)
    }

    pub async fn update(pool: &PgPool, existing: &Self, input: UpdateFaq) -> Result<Self> {
        let faq = sqlx::query_as::<_, Self>(
            r#"
            UPDATE faqs
            SET question = $1, answer = $2, category = $3, is_published = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(input.question.as_deref().unwrap_or(&existing.question))
        .bind(input.answer.as_deref().unwrap_or(&existing.answer))
        .bind(input.category.or_else(|| existing.category.clone()))
        .bind(input.is_published.unwrap_or(existing.is_published))
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to update faq")?;

        Ok(faq)
    }

    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<bool> {
        let mut tx = pool.begin().await.context("failed to begin faq delete")?;

        let result = sqlx::query("DELETE FROM faqs WHERE id = $1")
            .bind(existing.id)
            .execute(&mut *tx)
            .await
            .context("failed to delete faq")?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        ordering::compact_after_delete(&mut *tx, scope(existing.tenant_id), existing.sort_order)
            .await?;

        tx.commit().await.context("failed to commit faq delete")?;
        Ok(true)
    }

    pub async fn toggle_published(pool: &PgPool, existing: &Self) -> Result<Self> {
        let faq = sqlx::query_as::<_, Self>(
            "UPDATE faqs SET is_published = NOT is_published, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to toggle faq")?;

        Ok(faq)
    }

    pub async fn reorder(pool: &PgPool, tenant: &TenantContext, ids: &[i64]) -> Result<bool> {
        ordering::reorder(pool, scope(tenant.id), ids).await
    }
}
