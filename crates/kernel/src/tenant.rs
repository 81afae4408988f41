//! Tenant context passed explicitly to every content operation.

use axum::http::HeaderMap;
use serde::Serialize;

use crate::models::Tenant;

/// Header carrying an explicit tenant id.
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Header carrying the tenant's public domain, injected by the NGINX proxy.
pub const TENANT_DOMAIN_HEADER: &str = "x-tenant-domain";

/// The tenant a request operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantContext {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub domain: Option<String>,
}

impl TenantContext {
    pub fn new(id: i64, slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            slug: slug.into(),
            name: name.into(),
            domain: None,
        }
    }
}

impl From<&Tenant> for TenantContext {
    fn from(tenant: &Tenant) -> Self {
        Self {
            id: tenant.id,
            slug: tenant.slug.clone(),
            name: tenant.name.clone(),
            domain: tenant.domain.clone(),
        }
    }
}

/// How a request identifies its tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TenantLookup {
    /// `X-Tenant-Id`. Must exist.
    Id(i64),
    /// `X-Tenant-Domain`. Must exist.
    Domain(String),
    /// `Host`. Falls back to the master tenant when unknown.
    Host(String),
    /// Nothing usable; the master tenant.
    Default,
}

impl TenantLookup {
    /// Read the lookup key from request headers.
    ///
    /// Precedence: `X-Tenant-Id`, then `X-Tenant-Domain`, then `Host`.
    /// A malformed `X-Tenant-Id` is ignored.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        if let Some(id) = header(TENANT_ID_HEADER).and_then(|v| v.parse::<i64>().ok()) {
            return TenantLookup::Id(id);
        }
        if let Some(domain) = header(TENANT_DOMAIN_HEADER).and_then(normalize_host) {
            return TenantLookup::Domain(domain);
        }
        if let Some(host) = header("host").and_then(normalize_host) {
            return TenantLookup::Host(host);
        }
        TenantLookup::Default
    }

    /// Whether a miss on this lookup should fall back to the master tenant.
    pub fn falls_back(&self) -> bool {
        matches!(self, TenantLookup::Host(_) | TenantLookup::Default)
    }
}

/// Lowercase a host, dropping the port and a leading `www.`.
pub fn normalize_host(host: &str) -> Option<String> {
    let host = host.trim().to_ascii_lowercase();
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name.to_string(),
        _ => host,
    };
    let host = host.strip_prefix("www.").map(str::to_string).unwrap_or(host);
    if host.is_empty() { None } else { Some(host) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn id_header_wins() {
        let h = headers(&[
            ("x-tenant-id", "7"),
            ("x-tenant-domain", "acme.com"),
            ("host", "other.com"),
        ]);
        assert_eq!(TenantLookup::from_headers(&h), TenantLookup::Id(7));
    }

    #[test]
    fn malformed_id_falls_through_to_domain() {
        let h = headers(&[("x-tenant-id", "seven"), ("x-tenant-domain", "WWW.Acme.com")]);
        assert_eq!(
            TenantLookup::from_headers(&h),
            TenantLookup::Domain("acme.com".into())
        );
    }

    #[test]
    fn host_header_is_normalized() {
        let h = headers(&[("host", "www.acme.com:8080")]);
        assert_eq!(
            TenantLookup::from_headers(&h),
            TenantLookup::Host("acme.com".into())
        );
    }

    #[test]
    fn no_headers_means_default() {
        let lookup = TenantLookup::from_headers(&HeaderMap::new());
        assert_eq!(lookup, TenantLookup::Default);
        assert!(lookup.falls_back());
        assert!(!TenantLookup::Id(1).falls_back());
        assert!(!TenantLookup::Domain("a.com".into()).falls_back());
    }

    #[test]
    fn normalize_host_variants() {
        assert_eq!(normalize_host("Example.COM").unwrap(), "example.com");
        assert_eq!(normalize_host("localhost:3000").unwrap(), "localhost");
        assert_eq!(normalize_host("www."), None);
        assert_eq!(normalize_host(""), None);
    }
}
