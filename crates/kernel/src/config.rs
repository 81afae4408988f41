//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Redis connection URL.
    pub redis_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Path to uploads directory (default: ./uploads).
    pub uploads_dir: PathBuf,

    /// Base URL for serving uploaded files (default: /files).
    pub files_url: String,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Cookie SameSite policy: "strict", "lax", or "none" (default: "strict").
    pub cookie_same_site: String,

    /// Tenant whose content seeds new tenants (default: 1).
    pub master_tenant_id: i64,

    /// Frontend revalidation endpoint. When None, revalidation is skipped.
    pub frontend_revalidate_url: Option<String>,

    /// Shared secret sent with revalidation requests.
    pub frontend_revalidate_secret: Option<String>,

    /// Hex-encoded 32-byte key for encrypting webhook secrets at rest.
    pub webhook_encryption_key: Option<[u8; 32]>,

    /// Deployment settings for generated NGINX configs.
    pub deploy: DeployConfig,
}

/// Settings consumed by the NGINX/certbot deployment helpers.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Directory NGINX reads server blocks from (default: /etc/nginx/conf.d).
    pub sites_dir: PathBuf,

    /// Static frontend build root per tenant; `{slug}` is substituted.
    pub web_root: String,

    /// Backend origin the `/api/` location proxies to.
    pub backend_origin: String,

    /// Path to the `nginx` binary (default: nginx).
    pub nginx_bin: String,

    /// Path to the `certbot` binary (default: certbot).
    pub certbot_bin: String,

    /// Contact address passed to certbot.
    pub certbot_email: Option<String>,

    /// Let's Encrypt state directory (default: /etc/letsencrypt).
    pub letsencrypt_dir: PathBuf,

    /// Timeout for `nginx` invocations in seconds (default: 30).
    pub nginx_timeout_secs: u64,

    /// Timeout for `certbot` invocations in seconds (default: 180).
    pub certbot_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let files_url = env::var("FILES_URL").unwrap_or_else(|_| "/files".to_string());

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let cookie_same_site = env::var("COOKIE_SAME_SITE")
            .unwrap_or_else(|_| "strict".to_string())
            .to_lowercase();

        let master_tenant_id = env::var("MASTER_TENANT_ID")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .context("MASTER_TENANT_ID must be a valid i64")?;

        let frontend_revalidate_url = env::var("FRONTEND_REVALIDATE_URL")
            .ok()
            .filter(|s| !s.is_empty());
        let frontend_revalidate_secret = env::var("FRONTEND_REVALIDATE_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        let webhook_encryption_key = match env::var("WEBHOOK_ENCRYPTION_KEY") {
            Ok(hex_key) if !hex_key.is_empty() => Some(parse_encryption_key(&hex_key)?),
            _ => None,
        };

        let deploy = DeployConfig::from_env()?;

        Ok(Self {
            port,
            database_url,
            redis_url,
            database_max_connections,
            uploads_dir,
            files_url,
            cors_allowed_origins,
            cookie_same_site,
            master_tenant_id,
            frontend_revalidate_url,
            frontend_revalidate_secret,
            webhook_encryption_key,
            deploy,
        })
    }
}

impl DeployConfig {
    /// Load deployment settings from environment variables.
    pub fn from_env() -> Result<Self> {
        let sites_dir = env::var("NGINX_SITES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/etc/nginx/conf.d"));

        let web_root =
            env::var("DEPLOY_WEB_ROOT").unwrap_or_else(|_| "/var/www/{slug}/dist".to_string());

        let backend_origin =
            env::var("DEPLOY_BACKEND_ORIGIN").unwrap_or_else(|_| "http://127.0.0.1:3000".into());

        let nginx_bin = env::var("NGINX_BIN").unwrap_or_else(|_| "nginx".to_string());
        let certbot_bin = env::var("CERTBOT_BIN").unwrap_or_else(|_| "certbot".to_string());
        let certbot_email = env::var("CERTBOT_EMAIL").ok().filter(|s| !s.is_empty());
        let letsencrypt_dir = env::var("LETSENCRYPT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/etc/letsencrypt"));

        let nginx_timeout_secs = env::var("NGINX_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("NGINX_TIMEOUT_SECS must be a valid u64")?;

        let certbot_timeout_secs = env::var("CERTBOT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "180".to_string())
            .parse()
            .context("CERTBOT_TIMEOUT_SECS must be a valid u64")?;

        Ok(Self {
            sites_dir,
            web_root,
            backend_origin,
            nginx_bin,
            certbot_bin,
            certbot_email,
            letsencrypt_dir,
            nginx_timeout_secs,
            certbot_timeout_secs,
        })
    }
}

/// Parse a hex-encoded 32-byte key.
fn parse_encryption_key(hex_key: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_key.trim()).context("WEBHOOK_ENCRYPTION_KEY must be hex")?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("WEBHOOK_ENCRYPTION_KEY must decode to exactly 32 bytes"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn encryption_key_must_be_32_bytes() {
        let key = "42".repeat(32);
        assert_eq!(parse_encryption_key(&key).unwrap(), [0x42u8; 32]);
        assert!(parse_encryption_key("4242").is_err());
        assert!(parse_encryption_key("not-hex").is_err());
    }
}
