//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use redis::Client as RedisClient;
use sqlx::PgPool;
use tracing::info;

use crate::cache::CacheLayer;
use crate::config::Config;
use crate::content::SectionTypeRegistry;
use crate::db;
use crate::deploy::{DeployService, SystemCommandRunner};
use crate::file::{LocalFileStorage, MediaService};
use crate::metrics::Metrics;
use crate::middleware::TenantResolver;
use crate::services::events::{ContentEvent, ContentEvents, Revalidation};
use crate::services::webhook::WebhookService;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool.
    db: PgPool,

    /// Redis client for the L2 cache and health checks.
    redis: RedisClient,

    /// Two-tier cache layer (Moka L1 + Redis L2).
    cache: CacheLayer,

    config: Config,

    /// Static section and block type catalog.
    section_types: Arc<SectionTypeRegistry>,

    tenants: TenantResolver,

    /// Prometheus metrics.
    metrics: Arc<Metrics>,

    /// Cache invalidation, revalidation and webhooks after writes.
    events: ContentEvents,

    media: MediaService,

    deploy: DeployService,
}

impl AppState {
    /// Connect to PostgreSQL and Redis, apply migrations and build services.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        let redis = RedisClient::open(config.redis_url.as_str())
            .context("failed to create Redis client")?;

        let mut conn = redis
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to Redis")?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .context("Redis PING failed")?;

        Self::from_parts(config, db, redis)
    }

    /// Build state over existing connections. Used by [`AppState::new`] and
    /// router tests.
    pub fn from_parts(config: &Config, db: PgPool, redis: RedisClient) -> Result<Self> {
        let metrics = Arc::new(Metrics::new());
        let cache = CacheLayer::new(redis.clone());

        let webhooks = WebhookService::new(config.webhook_encryption_key, metrics.clone());
        let revalidation = config
            .frontend_revalidate_url
            .clone()
            .map(|url| Revalidation {
                url,
                secret: config.frontend_revalidate_secret.clone(),
            });
        let events = ContentEvents::new(
            db.clone(),
            cache.clone(),
            webhooks,
            revalidation,
            metrics.clone(),
        );

        let storage = Arc::new(LocalFileStorage::new(
            config.uploads_dir.clone(),
            config.files_url.clone(),
        ));
        let media = MediaService::new(db.clone(), storage, metrics.clone());

        let deploy = DeployService::new(
            config.deploy.clone(),
            Arc::new(SystemCommandRunner),
            metrics.clone(),
        )
        .context("failed to create deploy service")?;

        let section_types = Arc::new(SectionTypeRegistry::with_standard_types());
        info!(
            section_types = section_types.list_types().len(),
            "section type registry loaded"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                db,
                redis,
                cache,
                config: config.clone(),
                section_types,
                tenants: TenantResolver::new(config.master_tenant_id),
                metrics,
                events,
                media,
                deploy,
            }),
        })
    }

    /// Get the database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    /// Get the Redis client.
    pub fn redis(&self) -> &RedisClient {
        &self.inner.redis
    }

    /// Get the cache layer.
    pub fn cache(&self) -> &CacheLayer {
        &self.inner.cache
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn section_types(&self) -> &Arc<SectionTypeRegistry> {
        &self.inner.section_types
    }

    pub fn tenants(&self) -> &TenantResolver {
        &self.inner.tenants
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    pub fn events(&self) -> &ContentEvents {
        &self.inner.events
    }

    /// Shorthand for `events().emit(event)`.
    pub fn emit(&self, event: ContentEvent) {
        self.inner.events.emit(event);
    }

    pub fn webhooks(&self) -> &WebhookService {
        self.inner.events.webhooks()
    }

    pub fn media(&self) -> &MediaService {
        &self.inner.media
    }

    pub fn deploy(&self) -> &DeployService {
        &self.inner.deploy
    }

    /// Check if PostgreSQL is healthy.
    pub async fn postgres_healthy(&self) -> bool {
        db::check_health(&self.inner.db).await
    }

    /// Check if Redis is healthy.
    pub async fn redis_healthy(&self) -> bool {
        let Ok(mut conn) = self.inner.redis.get_multiplexed_async_connection().await else {
            return false;
        };

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}
