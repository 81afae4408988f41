//! Two-tier cache with Moka (L1) and Redis (L2).
//!
//! Keys are namespaced per tenant (`t:{tenant_id}:{resource}:...`) so a
//! content mutation can drop everything a tenant has cached for one resource
//! with a single prefix invalidation.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use redis::AsyncCommands;
use redis::Client as RedisClient;
use tracing::{debug, warn};

/// Default TTL for L1 cache (60 seconds).
const L1_TTL_SECS: u64 = 60;

/// Default TTL for L2 cache (5 minutes).
const L2_TTL_SECS: u64 = 300;

const L1_MAX_CAPACITY: u64 = 10_000;

/// Two-tier cache layer.
///
/// L1 (Moka): in-process, short TTL, per-instance.
/// L2 (Redis): shared across instances, longer TTL.
#[derive(Clone)]
pub struct CacheLayer {
    inner: Arc<CacheLayerInner>,
}

struct CacheLayerInner {
    local: Cache<String, String>,
    redis: RedisClient,
}

impl CacheLayer {
    pub fn new(redis: RedisClient) -> Self {
        let local = Cache::builder()
            .max_capacity(L1_MAX_CAPACITY)
            .time_to_live(Duration::from_secs(L1_TTL_SECS))
            .support_invalidation_closures()
            .build();

        Self {
            inner: Arc::new(CacheLayerInner { local, redis }),
        }
    }

    /// Prefix shared by every key of one tenant.
    pub fn tenant_prefix(tenant_id: i64) -> String {
        format!("t:{tenant_id}:")
    }

    /// Prefix shared by every key of one tenant resource.
    pub fn resource_prefix(tenant_id: i64, resource: &str) -> String {
        format!("{}{resource}:", Self::tenant_prefix(tenant_id))
    }

    /// Key for one cached value of a tenant resource.
    pub fn key(tenant_id: i64, resource: &str, id: &str) -> String {
        format!("{}{id}", Self::resource_prefix(tenant_id, resource))
    }

    /// Get a value. Checks L1 first, then L2; an L2 hit populates L1.
    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(val) = self.inner.local.get(key).await {
            debug!(key = %key, "cache L1 hit");
            return Some(val);
        }

        let mut conn = match self.inner.redis.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "failed to get Redis connection for cache");
                return None;
            }
        };

        let val: Option<String> = conn.get(key).await.ok()?;

        if let Some(ref v) = val {
            debug!(key = %key, "cache L2 hit, populating L1");
            self.inner.local.insert(key.to_string(), v.clone()).await;
        }

        val
    }

    /// Write a value to both tiers.
    pub async fn set(&self, key: &str, value: &str, ttl_secs: u64) {
        self.inner
            .local
            .insert(key.to_string(), value.to_string())
            .await;

        let Ok(mut conn) = self.inner.redis.get_multiplexed_async_connection().await else {
            warn!("failed to get Redis connection for cache set");
            return;
        };

        let ttl = if ttl_secs > 0 { ttl_secs } else { L2_TTL_SECS };
        if let Err(e) = conn.set_ex::<_, _, ()>(key, value, ttl).await {
            warn!(error = %e, key = %key, "failed to set cache value in Redis");
            return;
        }

        debug!(key = %key, ttl = %ttl, "cache set");
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.local.invalidate(key).await;

        let Ok(mut conn) = self.inner.redis.get_multiplexed_async_connection().await else {
            warn!("failed to get Redis connection for cache invalidate");
            return;
        };

        if let Err(e) = conn.del::<_, ()>(key).await {
            warn!(error = %e, key = %key, "failed to delete cache key from Redis");
        }

        debug!(key = %key, "cache invalidated");
    }

    /// Drop every key starting with `prefix` from both tiers. Returns the
    /// number of Redis keys deleted.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let owned = prefix.to_string();
        if let Err(e) = self
            .inner
            .local
            .invalidate_entries_if(move |key, _| key.starts_with(&owned))
        {
            warn!(error = %e, "failed to schedule L1 prefix invalidation");
        }

        let Ok(mut conn) = self.inner.redis.get_multiplexed_async_connection().await else {
            warn!("failed to get Redis connection for prefix invalidation");
            return 0;
        };

        let pattern = format!("{}*", escape_glob(prefix));
        let mut cursor = 0u64;
        let mut deleted = 0usize;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = match redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "SCAN failed during prefix invalidation");
                    break;
                }
            };

            if !keys.is_empty() {
                if let Err(e) = conn.del::<_, ()>(&keys).await {
                    warn!(error = %e, "failed to delete keys from Redis");
                } else {
                    deleted += keys.len();
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(prefix = %prefix, keys_deleted = deleted, "cache prefix invalidated");
        deleted
    }

    pub fn l1_entry_count(&self) -> u64 {
        self.inner.local.entry_count()
    }
}

/// Escape Redis glob metacharacters so a prefix matches literally.
fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl std::fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_tenant_namespaced() {
        assert_eq!(CacheLayer::resource_prefix(7, "page"), "t:7:page:");
        assert_eq!(CacheLayer::key(7, "page", "about"), "t:7:page:about");
    }

    #[test]
    fn glob_characters_are_escaped() {
        assert_eq!(escape_glob("t:1:page:"), "t:1:page:");
        assert_eq!(escape_glob("a*b?[c]"), "a\\*b\\?\\[c\\]");
    }

    #[tokio::test]
    async fn creation_does_not_connect() {
        let client = RedisClient::open("redis://127.0.0.1:6379").unwrap();
        let cache = CacheLayer::new(client);
        assert_eq!(cache.l1_entry_count(), 0);
    }
}
