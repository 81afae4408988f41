//! Section model: ordered content units of a page.
//!
//! Styles are normalized on every read, so API consumers always see the
//! fixed style key set.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use super::ordering::{self, OrderScope};
use super::page::Page;
use crate::content::{merge_content, merge_styles, normalize_styles};
use crate::tenant::TenantContext;

const TABLE: &str = "sections";

/// Section record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Section {
    pub id: i64,
    pub tenant_id: i64,
    pub page_id: i64,
    pub component_type: String,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub is_visible: bool,
    pub content: Value,
    pub styles: Value,
    pub settings: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A section ready to insert. `content` is already merged over the type's
/// defaults and validated.
#[derive(Debug, Clone)]
pub struct NewSection {
    pub component_type: String,
    pub content: Value,
    pub styles: Value,
    pub settings: Value,
    pub is_visible: bool,
}

/// Partial section update. Objects are shallow-merged into the stored ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSection {
    pub content: Option<Value>,
    pub styles: Option<Value>,
    pub settings: Option<Value>,
    pub is_visible: Option<bool>,
}

fn scope(page_id: i64) -> OrderScope {
    OrderScope::new(TABLE, "page_id", page_id)
}

impl Section {
    /// Replace stored styles with the normalized key set.
    pub fn normalized(mut self) -> Self {
        self.styles = Value::Object(normalize_styles(&self.styles));
        self
    }

    /// Sections of a page in order.
    pub async fn list_for_page(pool: &PgPool, page: &Page) -> Result<Vec<Self>> {
        let sections = sqlx::query_as::<_, Self>(
            "SELECT * FROM sections WHERE page_id = $1 AND tenant_id = $2 ORDER BY sort_order, id",
        )
        .bind(page.id)
        .bind(page.tenant_id)
        .fetch_all(pool)
        .await
        .context("failed to list sections")?;

        Ok(sections.into_iter().map(Self::normalized).collect())
    }

    /// Visible sections of a page in order, for public rendering.
    pub async fn visible_for_page(pool: &PgPool, page: &Page) -> Result<Vec<Self>> {
        let sections = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM sections
            WHERE page_id = $1 AND tenant_id = $2 AND is_visible
            ORDER BY sort_order, id
            "#,
        )
        .bind(page.id)
        .bind(page.tenant_id)
        .fetch_all(pool)
        .await
        .context("failed to list visible sections")?;

        Ok(sections.into_iter().map(Self::normalized).collect())
    }

    pub async fn find_by_id(pool: &PgPool, tenant: &TenantContext, id: i64) -> Result<Option<Self>> {
        let section =
            sqlx::query_as::<_, Self>("SELECT * FROM sections WHERE id = $1 AND tenant_id = $2")
                .bind(id)
                .bind(tenant.id)
                .fetch_optional(pool)
                .await
                .context("failed to fetch section")?;

        Ok(section.map(Self::normalized))
    }

    /// Append a section to the end of `page`.
    pub async fn create(pool: &PgPool, page: &Page, input: NewSection) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin section create")?;

        let order = ordering::next_order(&mut *tx, scope(page.id)).await?;
        let styles = Value::Object(normalize_styles(&input.styles));

        let section = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO sections (tenant_id, page_id, component_type, sort_order, is_visible,
                                  content, styles, settings)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(page.tenant_id)
        .bind(page.id)
        .bind(&input.component_type)
        .bind(order)
        .bind(input.is_visible)
        .bind(&input.content)
        .bind(&styles)
        .bind(&input.settings)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create section")?;

        tx.commit().await.context("failed to commit section create")?;
        Ok(section.normalized())
    }

    /// Content after applying `patch` to the stored content.
    pub fn merged_content(&self, patch: &Value) -> Value {
        merge_content(&self.content, patch)
    }

    /// Shallow-merge `input` into `existing`.
    ///
    /// Callers validate the merged content (see [`Section::merged_content`])
    /// before calling this.
    pub async fn update(pool: &PgPool, existing: &Self, input: UpdateSection) -> Result<Self> {
        let content = match &input.content {
            Some(patch) => existing.merged_content(patch),
            None => existing.content.clone(),
        };
        let styles = match &input.styles {
            Some(patch) => Value::Object(merge_styles(&existing.styles, patch)),
            None => existing.styles.clone(),
        };
        let settings = match &input.settings {
            Some(patch) => merge_content(&existing.settings, patch),
            None => existing.settings.clone(),
        };

        let section = sqlx::query_as::<_, Self>(
            r#"
            UPDATE sections
            SET content = $1, styles = $2, settings = $3, is_visible = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&content)
        .bind(&styles)
        .bind(&settings)
        .bind(input.is_visible.unwrap_or(existing.is_visible))
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to update section")?;

        Ok(section.normalized())
    }

    /// Overwrite the whole content object (block editor saves).
    pub async fn replace_content(pool: &PgPool, existing: &Self, content: &Value) -> Result<Self> {
        let section = sqlx::query_as::<_, Self>(
            "UPDATE sections SET content = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(content)
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to replace section content")?;

        Ok(section.normalized())
    }

    /// Delete a section and close the gap in its page's order.
    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<bool> {
        let mut tx = pool.begin().await.context("failed to begin section delete")?;

        let result = sqlx::query("DELETE FROM sections WHERE id = $1")
            .bind(existing.id)
            .execute(&mut *tx)
            .await
            .context("failed to delete section")?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        ordering::compact_after_delete(&mut *tx, scope(existing.page_id), existing.sort_order)
            .await?;

        tx.commit().await.context("failed to commit section delete")?;
        Ok(true)
    }

    /// Copy a section into the slot right after it; later siblings shift down.
    pub async fn duplicate(pool: &PgPool, existing: &Self) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin section duplicate")?;

        ordering::shift_after(&mut *tx, scope(existing.page_id), existing.sort_order).await?;
        let section = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO sections (tenant_id, page_id, component_type, sort_order, is_visible,
                                  content, styles, settings)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(existing.tenant_id)
        .bind(existing.page_id)
        .bind(&existing.component_type)
        .bind(existing.sort_order + 1)
        .bind(existing.is_visible)
        .bind(&existing.content)
        .bind(&existing.styles)
        .bind(&existing.settings)
        .fetch_one(&mut *tx)
        .await
        .context("failed to duplicate section")?;

        tx.commit().await.context("failed to commit section duplicate")?;
        Ok(section.normalized())
    }

    /// Flip section visibility.
    pub async fn toggle_visibility(pool: &PgPool, existing: &Self) -> Result<Self> {
        let section = sqlx::query_as::<_, Self>(
            "UPDATE sections SET is_visible = NOT is_visible, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to toggle section visibility")?;

        Ok(section.normalized())
    }

    /// Reorder the sections of `page`. Returns false on an id mismatch.
    pub async fn reorder(pool: &PgPool, page: &Page, ids: &[i64]) -> Result<bool> {
        ordering::reorder(pool, scope(page.id), ids).await
    }
}
