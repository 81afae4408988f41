//! Session management using Redis.

use anyhow::{Context, Result};
use fred::prelude::*;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_redis_store::RedisStore;

/// Session expiry after inactivity (24 hours).
pub const SESSION_EXPIRY_HOURS: i64 = 24;

/// Session key holding the authenticated user id.
pub const SESSION_USER_ID: &str = "user_id";

/// Parse the `COOKIE_SAME_SITE` setting. Unknown values mean strict.
pub fn same_site(policy: &str) -> SameSite {
    match policy {
        "lax" => SameSite::Lax,
        "none" => SameSite::None,
        _ => SameSite::Strict,
    }
}

/// Create the session layer using Redis as the backend.
pub async fn create_session_layer(
    redis_url: &str,
    same_site: SameSite,
) -> Result<SessionManagerLayer<RedisStore<Pool>>> {
    let config = Config::from_url(redis_url).context("failed to parse Redis URL")?;

    let pool = Builder::from_config(config)
        .build_pool(1)
        .context("failed to create Redis pool")?;

    pool.init()
        .await
        .context("failed to connect to Redis for sessions")?;

    let store = RedisStore::new(pool);

    // SameSite=None requires Secure
    let layer = SessionManagerLayer::new(store)
        .with_secure(true)
        .with_http_only(true)
        .with_same_site(same_site)
        .with_expiry(Expiry::OnInactivity(Duration::hours(SESSION_EXPIRY_HOURS)));

    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_site_policies() {
        assert_eq!(same_site("lax"), SameSite::Lax);
        assert_eq!(same_site("none"), SameSite::None);
        assert_eq!(same_site("strict"), SameSite::Strict);
        assert_eq!(same_site("bogus"), SameSite::Strict);
    }
}
