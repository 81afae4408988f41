//! Webhook subscription API routes. Admin only.
//!
//! Secrets are write-only: the plaintext is returned once, in the create
//! response, and stored sealed when an encryption key is configured.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use rand::RngCore;
use serde::Serialize;
use tower_sessions::Session;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{CreateWebhook, UpdateWebhook, Webhook};
use crate::routes::helpers::{check, found, require_admin};
use crate::services::webhook::{WebhookPayload, check_url};
use crate::state::AppState;
use crate::tenant::TenantContext;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/webhooks", get(list_webhooks).post(create_webhook))
        .route(
            "/api/webhooks/{id}",
            get(get_webhook).put(update_webhook).delete(delete_webhook),
        )
        .route("/api/webhooks/{id}/test", post(test_webhook))
}

#[derive(Debug, Serialize)]
struct CreatedWebhook {
    #[serde(flatten)]
    webhook: Webhook,
    /// Plaintext secret, shown only here.
    secret: String,
}

#[derive(Debug, Serialize)]
struct TestDelivery {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// 32 random bytes, hex encoded.
fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn check_webhook_url(errors: &mut FieldErrors, url: &str) {
    if let Err(rejection) = check_url(url) {
        errors.insert("url".into(), format!("The webhook URL is not allowed: {rejection}."));
    }
}

fn check_events(errors: &mut FieldErrors, events: Option<&[String]>) {
    let valid = events.is_none_or(|list| {
        list.iter().all(|e| {
            e == "*"
                || e.split_once('.')
                    .is_some_and(|(resource, action)| !resource.is_empty() && !action.is_empty())
        })
    });
    if !valid {
        errors.insert(
            "events".into(),
            "Events must be '*', 'resource.*' or 'resource.action'.".into(),
        );
    }
}

async fn load(state: &AppState, tenant: &TenantContext, id: i64) -> AppResult<Webhook> {
    found(Webhook::find_by_id(state.db(), tenant, id).await?)
}

async fn list_webhooks(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
) -> AppResult<Json<Vec<Webhook>>> {
    require_admin(&state, &session, &tenant).await?;
    Ok(Json(Webhook::list(state.db(), &tenant).await?))
}

async fn get_webhook(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Webhook>> {
    require_admin(&state, &session, &tenant).await?;
    Ok(Json(load(&state, &tenant, id).await?))
}

async fn create_webhook(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<CreateWebhook>,
) -> AppResult<(StatusCode, Json<CreatedWebhook>)> {
    require_admin(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    check_webhook_url(&mut errors, &input.url);
    check_events(&mut errors, input.events.as_deref());
    check(errors)?;

    let secret = input
        .secret
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(generate_secret);
    let stored = state.webhooks().seal_secret(&secret)?;
    let events = input.events.unwrap_or_else(|| vec!["*".to_string()]);

    let webhook = Webhook::create(
        state.db(),
        &tenant,
        &input.url,
        &stored,
        &events,
        input.is_active.unwrap_or(true),
    )
    .await?;

    tracing::info!(webhook_id = webhook.id, tenant_id = tenant.id, "webhook created");
    Ok((StatusCode::CREATED, Json(CreatedWebhook { webhook, secret })))
}

async fn update_webhook(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<UpdateWebhook>,
) -> AppResult<Json<Webhook>> {
    require_admin(&state, &session, &tenant).await?;
    let existing = load(&state, &tenant, id).await?;

    let mut errors = FieldErrors::new();
    if let Some(url) = &input.url {
        check_webhook_url(&mut errors, url);
    }
    check_events(&mut errors, input.events.as_deref());
    check(errors)?;

    let stored = match input.secret.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(secret) => Some(state.webhooks().seal_secret(secret)?),
        None => None,
    };

    let webhook = Webhook::update(state.db(), &existing, &input, stored.as_deref()).await?;
    Ok(Json(webhook))
}

async fn delete_webhook(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_admin(&state, &session, &tenant).await?;

    let existing = load(&state, &tenant, id).await?;
    if !Webhook::delete(state.db(), &existing).await? {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Send a signed `webhook.test` payload and report the outcome.
async fn test_webhook(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<TestDelivery>> {
    require_admin(&state, &session, &tenant).await?;
    let webhook = load(&state, &tenant, id).await?;

    let payload = WebhookPayload {
        resource_type: "webhook".into(),
        resource_id: webhook.id,
        resource_slug: None,
        action: "test".into(),
        tenant_id: tenant.id,
    };
    let body = serde_json::to_vec(&payload)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode payload: {e}")))?;

    let result = state.webhooks().deliver(&webhook, &body).await;
    state.metrics().record_webhook(result.is_ok());

    Ok(Json(match result {
        Ok(status) => TestDelivery {
            success: true,
            status: Some(status),
            error: None,
        },
        Err(e) => TestDelivery {
            success: false,
            status: None,
            error: Some(e.to_string()),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_are_64_hex_chars() {
        let a = generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, generate_secret());
    }

    #[test]
    fn event_patterns() {
        let mut errors = FieldErrors::new();
        let ok = ["*".to_string(), "page.*".to_string(), "faq.deleted".to_string()];
        check_events(&mut errors, Some(&ok));
        check_events(&mut errors, None);
        assert!(errors.is_empty());

        check_events(&mut errors, Some(&["page".to_string()]));
        assert!(errors.contains_key("events"));
    }

    #[test]
    fn private_urls_are_rejected() {
        let mut errors = FieldErrors::new();
        check_webhook_url(&mut errors, "http://127.0.0.1/hook");
        assert!(errors.contains_key("url"));
    }
}
