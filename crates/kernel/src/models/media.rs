//! Uploaded media files. The bytes live in file storage; this table keeps
//! their metadata.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_query::Order;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::listing::{ListQuery, PageRequest, Paginated};
use crate::tenant::TenantContext;

/// Media record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    pub id: i64,
    pub tenant_id: i64,
    /// Stored file name, unique within the folder.
    pub filename: String,
    /// Name the file was uploaded under.
    pub original_name: String,
    /// Storage path relative to the uploads root.
    pub path: String,
    pub url: String,
    pub mime_type: String,
    /// `image`, `video`, `audio` or `document`.
    pub media_type: String,
    pub size: i64,
    pub folder: String,
    pub alt_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata of a freshly stored file.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub filename: String,
    pub original_name: String,
    pub path: String,
    pub url: String,
    pub mime_type: String,
    pub media_type: String,
    pub size: i64,
    pub folder: String,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaFilters {
    pub search: Option<String>,
    pub folder: Option<String>,
    pub media_type: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMedia {
    pub alt_text: Option<String>,
}

impl Media {
    fn query(tenant: &TenantContext, filters: &MediaFilters) -> ListQuery {
        ListQuery::new("media", tenant.id)
            .search(&["original_name", "alt_text"], filters.search.as_deref())
            .filter_eq("folder", filters.folder.clone())
            .filter_eq("media_type", filters.media_type.clone())
            .order_by("created_at", Order::Desc)
            .order_by("id", Order::Desc)
    }

    pub async fn list(pool: &PgPool, tenant: &TenantContext, filters: &MediaFilters) -> Result<Vec<Self>> {
        Self::query(tenant, filters).fetch_all(pool).await
    }

    pub async fn paginate(
        pool: &PgPool,
        tenant: &TenantContext,
        filters: &MediaFilters,
    ) -> Result<Paginated<Self>> {
        Self::query(tenant, filters)
            .fetch_page(pool, PageRequest::new(filters.page, filters.per_page))
            .await
    }

    /// Distinct folders in use by a tenant.
    pub async fn folders(pool: &PgPool, tenant: &TenantContext) -> Result<Vec<String>> {
        let folders = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT folder FROM media WHERE tenant_id = $1 ORDER BY folder",
        )
        .bind(tenant.id)
        .fetch_all(pool)
        .await
        .context("failed to list media folders")?;

        Ok(folders)
    }

    pub async fn find_by_id(pool: &PgPool, tenant: &TenantContext, id: i64) -> Result<Option<Self>> {
        let media = sqlx::query_as::<_, Self>("SELECT * FROM media WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant.id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch media")?;

        Ok(media)
    }

    pub async fn create(pool: &PgPool, tenant: &TenantContext, input: NewMedia) -> Result<Self> {
        let media = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO media (tenant_id, filename, original_name, path, url, mime_type,
                               media_type, size, folder, alt_text)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(tenant.id)
        .bind(&input.filename)
        .bind(&input.original_name)
        .bind(&input.path)
        .bind(&input.url)
        .bind(&input.mime_type)
        .bind(&input.media_type)
        .bind(input.size)
        .bind(&input.folder)
        .bind(&input.alt_text)
        .fetch_one(pool)
        .await
        .context("failed to create media")?;

        Ok(media)
    }

    pub async fn update(pool: &PgPool, existing: &Self, input: UpdateMedia) -> Result<Self> {
        let media = sqlx::query_as::<_, Self>(
            "UPDATE media SET alt_text = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(input.alt_text.or_else(|| existing.alt_text.clone()))
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to update media")?;

        Ok(media)
    }

    /// Delete the row only. Callers remove the stored file.
    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(existing.id)
            .execute(pool)
            .await
            .context("failed to delete media")?;

        Ok(result.rows_affected() > 0)
    }
}
