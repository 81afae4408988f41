//! Outbound webhook delivery.
//!
//! Payloads are signed with HMAC-SHA256 over the raw body and sent once,
//! fire-and-forget. Secrets may be encrypted at rest with AES-256-GCM.
//! Target URLs are checked against private address space both when a
//! webhook is registered and again, after DNS resolution, at send time.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::Serialize;
use sha2::Sha256;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics::Metrics;
use crate::models::Webhook;

/// Per-delivery timeout.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying `sha256=<hex>`.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

const ENCRYPTED_PREFIX: &str = "enc:";
const NONCE_LEN: usize = 12;

/// Body POSTed to every subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub resource_type: String,
    pub resource_id: i64,
    pub resource_slug: Option<String>,
    pub action: String,
    pub tenant_id: i64,
}

impl WebhookPayload {
    /// Event name used for subscription matching, e.g. `page.updated`.
    pub fn event(&self) -> String {
        format!("{}.{}", self.resource_type, self.action)
    }
}

/// Reasons a webhook URL is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlRejection {
    #[error("invalid URL")]
    Malformed,
    #[error("unsupported scheme {0}")]
    Scheme(String),
    #[error("port {0} is not allowed; use 80, 443 or 8080-8443")]
    Port(u16),
    #[error("URL has no host")]
    NoHost,
    #[error("host {0} is not publicly routable")]
    PrivateHost(String),
}

/// Check a webhook URL without touching the network.
pub fn check_url(raw: &str) -> Result<url::Url, UrlRejection> {
    let parsed = url::Url::parse(raw).map_err(|_| UrlRejection::Malformed)?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlRejection::Scheme(parsed.scheme().to_string()));
    }
    if let Some(port) = parsed.port()
        && !matches!(port, 80 | 443 | 8080..=8443)
    {
        return Err(UrlRejection::Port(port));
    }

    let private = match parsed.host().ok_or(UrlRejection::NoHost)? {
        url::Host::Domain(domain) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost"
                || [".localhost", ".local", ".internal"]
                    .iter()
                    .any(|suffix| domain.ends_with(suffix))
                || domain.parse::<IpAddr>().is_ok_and(|ip| !is_public_ip(ip))
        }
        url::Host::Ipv4(ip) => !is_public_ip(IpAddr::V4(ip)),
        url::Host::Ipv6(ip) => !is_public_ip(IpAddr::V6(ip)),
    };
    if private {
        let host = parsed.host_str().unwrap_or_default().to_string();
        return Err(UrlRejection::PrivateHost(host));
    }

    Ok(parsed)
}

/// Whether an address is publicly routable.
pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    let shared = a == 100 && (b & 0xC0) == 64;
    let benchmarking = a == 198 && (b & 0xFE) == 18;
    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || shared
        || benchmarking)
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    !(ip.is_loopback() || ip.is_unspecified() || unique_local || link_local)
}

/// Resolve the URL host and refuse if any address is private.
async fn check_resolved(url: &url::Url) -> Result<()> {
    let Some(url::Host::Domain(host)) = url.host() else {
        return Ok(());
    };
    let port = url.port_or_known_default().unwrap_or(443);

    let mut any = false;
    for addr in tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("DNS resolution failed for {host}"))?
    {
        any = true;
        if !is_public_ip(addr.ip()) {
            anyhow::bail!("{host} resolved to non-public address {}", addr.ip());
        }
    }
    if !any {
        anyhow::bail!("{host} did not resolve");
    }
    Ok(())
}

/// Hex HMAC-SHA256 of `body` keyed with `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret.as_bytes()).context("invalid secret key")?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// AES-256-GCM cipher for secrets at rest. Ciphertext is stored as
/// `enc:` + hex(nonce || ciphertext).
#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; 32],
}

impl SecretCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256Gcm::new((&self.key).into());
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("encryption failed: {e}"))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(format!("{ENCRYPTED_PREFIX}{}", hex::encode(combined)))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String> {
        let Some(encoded) = stored.strip_prefix(ENCRYPTED_PREFIX) else {
            anyhow::bail!("secret is not encrypted");
        };
        let combined = hex::decode(encoded).context("invalid hex in encrypted secret")?;
        if combined.len() < NONCE_LEN {
            anyhow::bail!("encrypted secret too short");
        }
        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);

        let plaintext = Aes256Gcm::new((&self.key).into())
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| anyhow::anyhow!("decryption failed: {e}"))?;
        String::from_utf8(plaintext).context("decrypted secret is not valid UTF-8")
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

/// Delivers payloads to registered webhooks.
#[derive(Clone)]
pub struct WebhookService {
    client: reqwest::Client,
    cipher: Option<SecretCipher>,
    metrics: Arc<Metrics>,
}

impl WebhookService {
    pub fn new(encryption_key: Option<[u8; 32]>, metrics: Arc<Metrics>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            // A redirect could point at an internal address
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            client,
            cipher: encryption_key.map(SecretCipher::new),
            metrics,
        }
    }

    /// Form a secret takes in the database.
    pub fn seal_secret(&self, plaintext: &str) -> Result<String> {
        match &self.cipher {
            Some(cipher) if !plaintext.is_empty() => cipher.encrypt(plaintext),
            _ => Ok(plaintext.to_string()),
        }
    }

    /// Recover a stored secret. Plaintext secrets pass through.
    pub fn open_secret(&self, stored: &str) -> Result<String> {
        if !stored.starts_with(ENCRYPTED_PREFIX) {
            return Ok(stored.to_string());
        }
        match &self.cipher {
            Some(cipher) => cipher.decrypt(stored),
            None => anyhow::bail!("encrypted webhook secret but no WEBHOOK_ENCRYPTION_KEY set"),
        }
    }

    /// Send `payload` to every active subscriber of its event in the
    /// background. Returns the number of deliveries started.
    pub async fn dispatch(&self, pool: &PgPool, payload: &WebhookPayload) -> Result<usize> {
        let event = payload.event();
        let hooks = Webhook::subscribers(pool, payload.tenant_id, &event).await?;
        if hooks.is_empty() {
            return Ok(0);
        }

        let body = serde_json::to_vec(payload).context("failed to serialize webhook payload")?;
        let count = hooks.len();
        for hook in hooks {
            let service = self.clone();
            let body = body.clone();
            let event = event.clone();
            tokio::spawn(async move {
                let outcome = service.deliver(&hook, &body).await;
                service.metrics.record_webhook(outcome.is_ok());
                match outcome {
                    Ok(status) => {
                        info!(webhook_id = hook.id, event = %event, status, "webhook delivered");
                    }
                    Err(e) => {
                        warn!(webhook_id = hook.id, event = %event, error = %e, "webhook delivery failed");
                    }
                }
            });
        }

        debug!(event = %event, count, "webhook deliveries started");
        Ok(count)
    }

    /// POST `body` to one webhook. Returns the HTTP status on 2xx.
    pub async fn deliver(&self, hook: &Webhook, body: &[u8]) -> Result<u16> {
        let url = check_url(&hook.url).map_err(|e| anyhow::anyhow!("{e}"))?;
        check_resolved(&url).await?;

        let secret = self
            .open_secret(&hook.secret)
            .context("failed to decrypt webhook secret")?;

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("User-Agent", concat!("Tessera-Webhook/", env!("CARGO_PKG_VERSION")));

        if secret.is_empty() {
            warn!(webhook_id = hook.id, "delivering unsigned webhook: no secret configured");
        } else {
            request = request.header(SIGNATURE_HEADER, format!("sha256={}", sign(&secret, body)?));
        }

        let response = request
            .body(body.to_vec())
            .send()
            .await
            .context("webhook request failed")?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            anyhow::bail!("webhook endpoint returned HTTP {status}")
        }
    }
}

impl std::fmt::Debug for WebhookService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookService").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_hex_hmac() {
        // Known HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let sig = sign("key", b"The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(
            sig,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn payload_event_and_shape() {
        let payload = WebhookPayload {
            resource_type: "page".into(),
            resource_id: 4,
            resource_slug: Some("about".into()),
            action: "updated".into(),
            tenant_id: 2,
        };
        assert_eq!(payload.event(), "page.updated");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["resource_slug"], "about");
        assert_eq!(json["tenant_id"], 2);
    }

    #[test]
    fn cipher_round_trip_uses_fresh_nonces() {
        let cipher = SecretCipher::new([0x42; 32]);
        let a = cipher.encrypt("s3cret").unwrap();
        let b = cipher.encrypt("s3cret").unwrap();
        assert!(a.starts_with("enc:"));
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), "s3cret");
        assert!(SecretCipher::new([0x99; 32]).decrypt(&a).is_err());
    }

    #[test]
    fn plaintext_secrets_pass_through() {
        let service = WebhookService::new(None, Arc::new(Metrics::new()));
        assert_eq!(service.seal_secret("plain").unwrap(), "plain");
        assert_eq!(service.open_secret("plain").unwrap(), "plain");
        assert!(service.open_secret("enc:00").is_err());
    }

    #[test]
    fn private_targets_are_refused() {
        for url in [
            "https://127.0.0.1/hook",
            "https://10.0.0.1/hook",
            "https://192.168.1.1/hook",
            "https://169.254.169.254/latest/meta-data/",
            "http://[::1]/hook",
            "http://[::ffff:10.0.0.1]/hook",
            "https://localhost/hook",
            "https://db.internal/hook",
            "https://printer.local/hook",
        ] {
            assert!(
                matches!(check_url(url), Err(UrlRejection::PrivateHost(_))),
                "{url} should be refused"
            );
        }
    }

    #[test]
    fn scheme_and_port_rules() {
        assert_eq!(
            check_url("ftp://example.com/hook").unwrap_err(),
            UrlRejection::Scheme("ftp".into())
        );
        assert_eq!(
            check_url("https://example.com:6379/hook").unwrap_err(),
            UrlRejection::Port(6379)
        );
        assert!(check_url("https://example.com:8443/hook").is_ok());
        assert!(check_url("not a url").is_err());
    }

    #[test]
    fn public_targets_are_allowed() {
        assert!(check_url("https://example.com/webhook").is_ok());
        assert!(check_url("http://203.0.114.1/hook").is_ok());
    }

    #[test]
    fn address_classes() {
        assert!(!is_public_ip(IpAddr::V4(Ipv4Addr::new(100, 64, 0, 1))));
        assert!(is_public_ip(IpAddr::V4(Ipv4Addr::new(100, 128, 0, 1))));
        assert!(!is_public_ip(IpAddr::V4(Ipv4Addr::new(198, 18, 0, 1))));
        assert!(is_public_ip(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
        let mapped = Ipv6Addr::new(0, 0, 0, 0, 0, 0xffff, 0x0808, 0x0808);
        assert!(is_public_ip(IpAddr::V6(mapped)));
    }
}
