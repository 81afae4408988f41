//! Tenant key/value settings, grouped for the admin UI.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{PgExecutor, PgPool};

use crate::tenant::TenantContext;

/// Group used when none is given.
pub const DEFAULT_GROUP: &str = "general";

/// Setting record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setting {
    pub id: i64,
    pub tenant_id: i64,
    pub key: String,
    pub value: Value,
    pub group: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of a bulk settings update.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingInput {
    pub key: String,
    pub value: Value,
    pub group: Option<String>,
}

impl Setting {
    /// All settings of a tenant, optionally limited to one group.
    pub async fn list(pool: &PgPool, tenant: &TenantContext, group: Option<&str>) -> Result<Vec<Self>> {
        let settings = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM settings
            WHERE tenant_id = $1 AND ($2::text IS NULL OR "group" = $2)
            ORDER BY "group", key
            "#,
        )
        .bind(tenant.id)
        .bind(group)
        .fetch_all(pool)
        .await
        .context("failed to list settings")?;

        Ok(settings)
    }

    /// Value of one key.
    pub async fn get(pool: &PgPool, tenant: &TenantContext, key: &str) -> Result<Option<Value>> {
        let value = sqlx::query_scalar::<_, Value>(
            "SELECT value FROM settings WHERE tenant_id = $1 AND key = $2",
        )
        .bind(tenant.id)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("failed to get setting")?;

        Ok(value)
    }

    /// Upsert one key. An omitted group keeps the stored one, or
    /// [`DEFAULT_GROUP`] for a new key.
    pub async fn set<'e, E>(
        executor: E,
        tenant_id: i64,
        key: &str,
        value: &Value,
        group: Option<&str>,
    ) -> Result<Self>
    where
        E: PgExecutor<'e>,
    {
        let setting = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO settings (tenant_id, key, value, "group")
            VALUES ($1, $2, $3, COALESCE($4, $5))
            ON CONFLICT (tenant_id, key) DO UPDATE
            SET value = EXCLUDED.value,
                "group" = COALESCE($4, settings."group"),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(key)
        .bind(value)
        .bind(group)
        .bind(DEFAULT_GROUP)
        .fetch_one(executor)
        .await
        .context("failed to set setting")?;

        Ok(setting)
    }

    /// Upsert several keys in one transaction.
    pub async fn set_many(
        pool: &PgPool,
        tenant: &TenantContext,
        inputs: &[SettingInput],
    ) -> Result<Vec<Self>> {
        let mut tx = pool.begin().await.context("failed to begin settings update")?;
        let mut saved = Vec::with_capacity(inputs.len());
        for input in inputs {
            saved.push(
                Self::set(&mut *tx, tenant.id, &input.key, &input.value, input.group.as_deref())
                    .await?,
            );
        }
        tx.commit().await.context("failed to commit settings update")?;
        Ok(saved)
    }

    /// Key to value map of one group.
    pub async fn group(
        pool: &PgPool,
        tenant: &TenantContext,
        group: &str,
    ) -> Result<BTreeMap<String, Value>> {
        let settings = Self::list(pool, tenant, Some(group)).await?;
        Ok(settings.into_iter().map(|s| (s.key, s.value)).collect())
    }

    /// Key to value map of every setting of a tenant.
    pub async fn all_as_map(pool: &PgPool, tenant: &TenantContext) -> Result<BTreeMap<String, Value>> {
        let settings = Self::list(pool, tenant, None).await?;
        Ok(settings.into_iter().map(|s| (s.key, s.value)).collect())
    }

    pub async fn delete(pool: &PgPool, tenant: &TenantContext, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE tenant_id = $1 AND key = $2")
            .bind(tenant.id)
            .bind(key)
            .execute(pool)
            .await
            .context("failed to delete setting")?;

        Ok(result.rows_affected() > 0)
    }
}
