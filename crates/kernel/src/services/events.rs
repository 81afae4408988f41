//! Side effects of content mutations: cache invalidation, frontend
//! revalidation and webhook delivery.
//!
//! Handlers call [`ContentEvents::emit`] after a successful write. All work
//! runs on a spawned task; failures are logged and counted, never retried,
//! and never fail the request.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, warn};

use super::webhook::{WebhookPayload, WebhookService};
use crate::cache::CacheLayer;
use crate::metrics::Metrics;

/// Timeout of the frontend revalidation POST.
pub const REVALIDATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the shared revalidation secret.
pub const REVALIDATE_SECRET_HEADER: &str = "X-Revalidate-Secret";

/// What happened to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentAction {
    Created,
    Updated,
    Deleted,
    Reordered,
    Published,
    Unpublished,
    Cloned,
}

impl ContentAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentAction::Created => "created",
            ContentAction::Updated => "updated",
            ContentAction::Deleted => "deleted",
            ContentAction::Reordered => "reordered",
            ContentAction::Published => "published",
            ContentAction::Unpublished => "unpublished",
            ContentAction::Cloned => "cloned",
        }
    }

    /// `Published` or `Unpublished` after a toggle.
    pub fn publication(is_published: bool) -> Self {
        if is_published {
            ContentAction::Published
        } else {
            ContentAction::Unpublished
        }
    }
}

/// One content mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentEvent {
    pub tenant_id: i64,
    /// Resource kind, e.g. `page`, `section`, `service`.
    pub resource_type: &'static str,
    pub resource_id: i64,
    pub resource_slug: Option<String>,
    pub action: ContentAction,
}

impl ContentEvent {
    pub fn new(tenant_id: i64, resource_type: &'static str, resource_id: i64, action: ContentAction) -> Self {
        Self {
            tenant_id,
            resource_type,
            resource_id,
            resource_slug: None,
            action,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.resource_slug = Some(slug.into());
        self
    }

    /// Cache prefix this event invalidates.
    ///
    /// Sections are cached with their page and categories with their
    /// services. Tenant-wide events drop the whole tenant namespace.
    pub fn cache_prefix(&self) -> String {
        let resource = match self.resource_type {
            "tenant" => return CacheLayer::tenant_prefix(self.tenant_id),
            "section" => "page",
            "service_category" => "service",
            other => other,
        };
        CacheLayer::resource_prefix(self.tenant_id, resource)
    }

    pub fn webhook_payload(&self) -> WebhookPayload {
        WebhookPayload {
            resource_type: self.resource_type.to_string(),
            resource_id: self.resource_id,
            resource_slug: self.resource_slug.clone(),
            action: self.action.as_str().to_string(),
            tenant_id: self.tenant_id,
        }
    }

    fn revalidate_body(&self) -> RevalidateBody<'_> {
        RevalidateBody {
            tenant_id: self.tenant_id,
            resource_type: self.resource_type,
            resource_slug: self.resource_slug.as_deref(),
            action: self.action,
        }
    }
}

#[derive(Debug, Serialize)]
struct RevalidateBody<'a> {
    tenant_id: i64,
    resource_type: &'a str,
    resource_slug: Option<&'a str>,
    action: ContentAction,
}

/// Frontend revalidation endpoint settings.
#[derive(Debug, Clone)]
pub struct Revalidation {
    pub url: String,
    pub secret: Option<String>,
}

/// Fans a content event out to the cache, the frontend and webhooks.
#[derive(Clone)]
pub struct ContentEvents {
    pool: PgPool,
    cache: CacheLayer,
    webhooks: WebhookService,
    revalidation: Option<Revalidation>,
    client: reqwest::Client,
    metrics: Arc<Metrics>,
}

impl ContentEvents {
    pub fn new(
        pool: PgPool,
        cache: CacheLayer,
        webhooks: WebhookService,
        revalidation: Option<Revalidation>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REVALIDATE_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            pool,
            cache,
            webhooks,
            revalidation,
            client,
            metrics,
        }
    }

    pub fn webhooks(&self) -> &WebhookService {
        &self.webhooks
    }

    /// Run the side effects of `event` in the background.
    pub fn emit(&self, event: ContentEvent) {
        let events = self.clone();
        tokio::spawn(async move {
            events.process(&event).await;
        });
    }

    /// Run the side effects of `event` to completion.
    pub async fn process(&self, event: &ContentEvent) {
        let deleted = self.cache.invalidate_prefix(&event.cache_prefix()).await;
        debug!(
            tenant_id = event.tenant_id,
            resource = event.resource_type,
            deleted,
            "content cache invalidated"
        );

        if let Some(revalidation) = &self.revalidation {
            let ok = self.revalidate(revalidation, event).await;
            self.metrics.record_revalidation(ok);
        }

        if let Err(e) = self.webhooks.dispatch(&self.pool, &event.webhook_payload()).await {
            warn!(error = %e, tenant_id = event.tenant_id, "failed to dispatch webhooks");
        }
    }

    async fn revalidate(&self, revalidation: &Revalidation, event: &ContentEvent) -> bool {
        let mut request = self.client.post(&revalidation.url).json(&event.revalidate_body());
        if let Some(secret) = &revalidation.secret {
            request = request.header(REVALIDATE_SECRET_HEADER, secret);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "frontend revalidation rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "frontend revalidation failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for ContentEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentEvents")
            .field("revalidation", &self.revalidation.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn event_maps_to_prefix_and_payload() {
        let event = ContentEvent::new(3, "page", 9, ContentAction::Updated).with_slug("about");
        assert_eq!(event.cache_prefix(), "t:3:page:");

        let section = ContentEvent::new(3, "section", 4, ContentAction::Reordered);
        assert_eq!(section.cache_prefix(), "t:3:page:");

        let clone = ContentEvent::new(3, "tenant", 3, ContentAction::Cloned);
        assert_eq!(clone.cache_prefix(), "t:3:");

        let payload = event.webhook_payload();
        assert_eq!(payload.event(), "page.updated");
        assert_eq!(payload.resource_slug.as_deref(), Some("about"));
    }

    #[test]
    fn revalidate_body_shape() {
        let event = ContentEvent::new(1, "service", 2, ContentAction::publication(false));
        let body = serde_json::to_value(event.revalidate_body()).unwrap();
        assert_eq!(body["action"], "unpublished");
        assert_eq!(body["resource_type"], "service");
        assert!(body["resource_slug"].is_null());
    }
}
