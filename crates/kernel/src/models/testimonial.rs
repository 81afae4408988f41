//! Customer testimonials, ordered per tenant.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_query::Order;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::listing::{ListFilters, ListQuery, Paginated};
use super::ordering::{self, OrderScope};
use crate::tenant::TenantContext;

const TABLE: &str = "testimonials";

/// Testimonial record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Testimonial {
    pub id: i64,
    pub tenant_id: i64,
    pub author_name: String,
    pub author_title: Option<String>,
    pub company: Option<String>,
    pub quote: String,
    /// Star rating, 1 to 5.
    pub rating: i16,
    pub avatar: Option<String>,
    pub is_published: bool,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a testimonial.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTestimonial {
    pub author_name: String,
    pub author_title: Option<String>,
    pub company: Option<String>,
    pub quote: String,
    pub rating: Option<i16>,
    pub avatar: Option<String>,
    pub is_published: Option<bool>,
}

/// Input for updating a testimonial.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTestimonial {
    pub author_name: Option<String>,
    pub author_title: Option<String>,
    pub company: Option<String>,
    pub quote: Option<String>,
    pub rating: Option<i16>,
    pub avatar: Option<String>,
    pub is_published: Option<bool>,
}

/// Clamp a rating into `1..=5`, defaulting to 5.
pub fn clamp_rating(rating: Option<i16>) -> i16 {
    rating.unwrap_or(5).clamp(1, 5)
}

fn scope(tenant_id: i64) -> OrderScope {
    OrderScope::new(TABLE, "tenant_id", tenant_id)
}

impl Testimonial {
    fn query(tenant: &TenantContext, filters: &ListFilters) -> ListQuery {
        ListQuery::new(TABLE, tenant.id)
            .search(&["author_name", "quote"], filters.search.as_deref())
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
        let testimonial = sqlx::query_as::<_, Self>(
            "SELECT * FROM testimonials WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant.id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch testimonial")?;

        Ok(testimonial)
    }

    pub async fn create(pool: &PgPool, tenant: &TenantContext, input: CreateTestimonial) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin testimonial create")?;
        let order = ordering::next_order(&mut *tx, scope(tenant.id)).await?;

        let testimonial = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO testimonials (tenant_id, author_name, author_title, company, quote,
                                      rating, avatar, is_published, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(tenant.id)
        .bind(&input.author_name)
        .bind(&input.author_title)
        .bind(&input.company)
        .bind(&input.quote)
        .bind(clamp_rating(input.rating))
        .bind(&input.avatar)
        .bind(input.is_published.unwrap_or(true))
        .bind(order)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create testimonial")?;

        tx.commit().await.context("failed to commit testimonial create")?;
        Ok(testimonial)
    }

    pub async fn update(pool: &PgPool, existing: &Self, input: UpdateTestimonial) -> Result<Self> {
        let testimonial = sqlx::query_as::<_, Self>(
            r#"
            UPDATE testimonials
            SET author_name = $1, author_title = $2, company = $3, quote = $4, rating = $5,
                avatar = $6, is_published = $7, updated_at = NOW()
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(input.author_name.as_deref().unwrap_or(&existing.author_name))
        .bind(input.author_title.or_else(|| existing.author_title.clone()))
        .bind(input.company.or_else(|| existing.company.clone()))
        .bind(input.quote.as_deref().unwrap_or(&existing.quote))
        .bind(clamp_rating(input.rating.or(Some(existing.rating))))
        .bind(input.avatar.or_else(|| existing.avatar.clone()))
        .bind(input.is_published.unwrap_or(existing.is_published))
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to update testimonial")?;

        Ok(testimonial)
    }

    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<bool> {
        let mut tx = pool.begin().await.context("failed to begin testimonial delete")?;

        let result = sqlx::query("DELETE FROM testimonials WHERE id = $1")
            .bind(existing.id)
            .execute(&mut *tx)
            .await
            .context("failed to delete testimonial")?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        ordering::compact_after_delete(&mut *tx, scope(existing.tenant_id), existing.sort_order)
            .await?;

        tx.commit().await.context("failed to commit testimonial delete")?;
        Ok(true)
    }

    pub async fn toggle_published(pool: &PgPool, existing: &Self) -> Result<Self> {
        let testimonial = sqlx::query_as::<_, Self>(
            "UPDATE testimonials SET is_published = NOT is_published, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to toggle testimonial")?;

        Ok(testimonial)
    }

    pub async fn reorder(pool: &PgPool, tenant: &TenantContext, ids: &[i64]) -> Result<bool> {
        ordering::reorder(pool, scope(tenant.id), ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_is_clamped() {
        assert_eq!(clamp_rating(None), 5);
        assert_eq!(clamp_rating(Some(0)), 1);
        assert_eq!(clamp_rating(Some(3)), 3);
        assert_eq!(clamp_rating(Some(9)), 5);
    }
}
