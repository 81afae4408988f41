//! Team member profiles, ordered per tenant.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_query::Order;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use super::listing::{ListFilters, ListQuery, Paginated};
use super::ordering::{self, OrderScope};
use crate::tenant::TenantContext;

const TABLE: &str = "team_members";

/// Team member record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub position: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<String>,
    pub email: Option<String>,
    /// Network name to profile URL.
    pub social_links: Value,
    pub is_published: bool,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTeamMember {
    pub name: String,
    pub position: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<String>,
    pub email: Option<String>,
    pub social_links: Option<Value>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTeamMember {
    pub name: Option<String>,
    pub position: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<String>,
    pub email: Option<String>,
    pub social_links: Option<Value>,
    pub is_published: Option<bool>,
}

fn scope(tenant_id: i64) -> OrderScope {
    OrderScope::new(TABLE, "tenant_id", tenant_id)
}

impl TeamMember {
    fn query(tenant: &TenantContext, filters: &ListFilters) -> ListQuery {
        ListQuery::new(TABLE, tenant.id)
            .search(&["name", "position"], filters.search.as_deref())
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
        let member = sqlx::query_as::<_, Self>(
            "SELECT * FROM team_members WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant.id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch team member")?;

        Ok(member)
    }

    pub async fn create(pool: &PgPool, tenant: &TenantContext, input: CreateTeamMember) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin team member create")?;
        let order = ordering::next_order(&mut *tx, scope(tenant.id)).await?;

        let member = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO team_members (tenant_id, name, position, bio, photo, email,
                                      social_links, is_published, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(tenant.id)
        .bind(&input.name)
        .bind(&input.position)
        .bind(&input.bio)
        .bind(&input.photo)
        .bind(&input.email)
        .bind(input.social_links.unwrap_or_else(|| serde_json::json!({})))
        .bind(input.is_published.unwrap_or(true))
        .bind(order)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create team member")?;

        tx.commit().await.context("failed to commit team member create")?;
        Ok(member)
    }

    pub async fn update(pool: &PgPool, existing: &Self, input: UpdateTeamMember) -> Result<Self> {
        let member = sqlx::query_as::<_, Self>(
            r#"
            UPDATE team_members
            SET name = $1, position = $2, bio = $3, photo = $4, email = $5,
                social_links = $6, is_published = $7, updated_at = NOW()
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(input.name.as_deref().unwrap_or(&existing.name))
        .bind(input.position.or_else(|| existing.position.clone()))
        .bind(input.bio.or_else(|| existing.bio.clone()))
        .bind(input.photo.or_else(|| existing.photo.clone()))
        .bind(input.email.or_else(|| existing.email.clone()))
        .bind(input.social_links.unwrap_or_else(|| existing.social_links.clone()))
        .bind(input.is_published.unwrap_or(existing.is_published))
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to update team member")?;

        Ok(member)
    }

    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<bool> {
        let mut tx = pool.begin().await.context("failed to begin team member delete")?;

        let result = sqlx::query("DELETE FROM team_members WHERE id = $1")
            .bind(existing.id)
            .execute(&mut *tx)
            .await
            .context("failed to delete team member")?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        ordering::compact_after_delete(&mut *tx, scope(existing.tenant_id), existing.sort_order)
            .await?;

        tx.commit().await.context("failed to commit team member delete")?;
        Ok(true)
    }

    pub async fn toggle_published(pool: &PgPool, existing: &Self) -> Result<Self> {
        let member = sqlx::query_as::<_, Self>(
            "UPDATE team_members SET is_published = NOT is_published, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to toggle team member")?;

        Ok(member)
    }

    pub async fn reorder(pool: &PgPool, tenant: &TenantContext, ids: &[i64]) -> Result<bool> {
        ordering::reorder(pool, scope(tenant.id), ids).await
    }
}
