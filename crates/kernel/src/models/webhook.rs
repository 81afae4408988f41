//! Registered outbound webhooks.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use crate::tenant::TenantContext;

/// Webhook record. `secret` may hold an `enc:` prefixed ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Webhook {
    pub id: i64,
    pub tenant_id: i64,
    pub url: String,
    #[serde(skip_serializing)]
    pub secret: String,
    /// Event patterns: `*`, `page.*` or `page.updated`.
    pub events: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWebhook {
    pub url: String,
    pub secret: Option<String>,
    pub events: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWebhook {
    pub url: Option<String>,
    pub secret: Option<String>,
    pub events: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

/// Whether `pattern` selects `event` (`resource.action`).
pub fn event_matches(pattern: &str, event: &str) -> bool {
    if pattern == "*" || pattern == event {
        return true;
    }
    match pattern.strip_suffix(".*") {
        Some(resource) => event
            .split_once('.')
            .is_some_and(|(event_resource, _)| event_resource == resource),
        None => false,
    }
}

impl Webhook {
    /// Whether this webhook wants `event`.
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events
            .as_array()
            .is_some_and(|patterns| {
                patterns
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|p| event_matches(p, event))
            })
    }

    pub async fn list(pool: &PgPool, tenant: &TenantContext) -> Result<Vec<Self>> {
        let hooks = sqlx::query_as::<_, Self>(
            "SELECT * FROM webhooks WHERE tenant_id = $1 ORDER BY id",
        )
        .bind(tenant.id)
        .fetch_all(pool)
        .await
        .context("failed to list webhooks")?;

        Ok(hooks)
    }

    /// Active webhooks of a tenant subscribed to `event`.
    pub async fn subscribers(pool: &PgPool, tenant_id: i64, event: &str) -> Result<Vec<Self>> {
        let hooks = sqlx::query_as::<_, Self>(
            "SELECT * FROM webhooks WHERE tenant_id = $1 AND is_active = TRUE ORDER BY id",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .context("failed to list webhook subscribers")?;

        Ok(hooks.into_iter().filter(|h| h.subscribes_to(event)).collect())
    }

    pub async fn find_by_id(pool: &PgPool, tenant: &TenantContext, id: i64) -> Result<Option<Self>> {
        let hook =
            sqlx::query_as::<_, Self>("SELECT * FROM webhooks WHERE id = $1 AND tenant_id = $2")
                .bind(id)
                .bind(tenant.id)
                .fetch_optional(pool)
                .await
                .context("failed to fetch webhook")?;

        Ok(hook)
    }

    /// Insert a webhook. `stored_secret` is already encrypted.
    pub async fn create(
        pool: &PgPool,
        tenant: &TenantContext,
        url: &str,
        stored_secret: &str,
        events: &[String],
        is_active: bool,
    ) -> Result<Self> {
        let hook = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO webhooks (tenant_id, url, secret, events, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant.id)
        .bind(url)
        .bind(stored_secret)
        .bind(serde_json::json!(events))
        .bind(is_active)
        .fetch_one(pool)
        .await
        .context("failed to create webhook")?;

        Ok(hook)
    }

    /// Update a webhook. `stored_secret` replaces the secret when present.
    pub async fn update(
        pool: &PgPool,
        existing: &Self,
        input: &UpdateWebhook,
        stored_secret: Option<&str>,
    ) -> Result<Self> {
        let events = input
            .events
            .as_ref()
            .map(|e| serde_json::json!(e))
            .unwrap_or_else(|| existing.events.clone());

        let hook = sqlx::query_as::<_, Self>(
            r#"
            UPDATE webhooks
            SET url = $1, secret = $2, events = $3, is_active = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(input.url.as_deref().unwrap_or(&existing.url))
        .bind(stored_secret.unwrap_or(&existing.secret))
        .bind(&events)
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to update webhook")?;

        Ok(hook)
    }

    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = $1")
            .bind(existing.id)
            .execute(pool)
            .await
            .context("failed to delete webhook")?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_match_events() {
        assert!(event_matches("*", "page.updated"));
        assert!(event_matches("page.*", "page.deleted"));
        assert!(event_matches("page.updated", "page.updated"));
        assert!(!event_matches("page.*", "pages.updated"));
        assert!(!event_matches("service.created", "service.updated"));
    }
}
