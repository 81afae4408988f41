//! Strict input checks run before any file write or subprocess.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::services::slug::MAX_SLUG_LEN;

#[allow(clippy::expect_used)]
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$").expect("domain regex")
});

#[allow(clippy::expect_used)]
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9._%+-]{1,64}@(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$",
    )
    .expect("email regex")
});

#[allow(clippy::expect_used)]
static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("slug regex"));

#[allow(clippy::expect_used)]
static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/[A-Za-z0-9._/-]*$").expect("path regex"));

/// A deployment input that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("invalid domain: {0}")]
    Domain(String),

    #[error("invalid email: {0}")]
    Email(String),

    #[error("invalid tenant slug: {0}")]
    Slug(String),

    #[error("invalid web root: {0}")]
    WebRoot(String),

    #[error("invalid backend origin: {0}")]
    BackendOrigin(String),
}

/// Lowercase and check a bare domain such as `acme.com`.
///
/// A leading `www.` is refused; the generated config adds it.
pub fn domain(input: &str) -> Result<String, InvalidInput> {
    let domain = input.trim().to_ascii_lowercase();
    if domain.len() > 253 || domain.starts_with("www.") || !DOMAIN_RE.is_match(&domain) {
        return Err(InvalidInput::Domain(input.to_string()));
    }
    Ok(domain)
}

pub fn email(input: &str) -> Result<String, InvalidInput> {
    let email = input.trim();
    if email.len() > 254 || !EMAIL_RE.is_match(email) {
        return Err(InvalidInput::Email(input.to_string()));
    }
    Ok(email.to_string())
}

/// Tenant slugs name the config file, so they must be a single safe segment
/// no longer than a generated slug.
pub fn slug(input: &str) -> Result<&str, InvalidInput> {
    if input.len() <= MAX_SLUG_LEN && SLUG_RE.is_match(input) {
        Ok(input)
    } else {
        Err(InvalidInput::Slug(input.to_string()))
    }
}

/// Absolute path made of safe characters, without `..` segments.
pub fn web_root(input: &str) -> Result<&str, InvalidInput> {
    if PATH_RE.is_match(input) && !input.split('/').any(|s| s == "..") {
        Ok(input)
    } else {
        Err(InvalidInput::WebRoot(input.to_string()))
    }
}

/// `http(s)://host[:port]` with no path, query or credentials.
pub fn backend_origin(input: &str) -> Result<String, InvalidInput> {
    let invalid = || InvalidInput::BackendOrigin(input.to_string());
    let url = Url::parse(input).map_err(|_| invalid())?;

    let plain = matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some()
        && url.username().is_empty()
        && url.password().is_none()
        && url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none();
    if !plain {
        return Err(invalid());
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn domains() {
        assert_eq!(domain(" Acme.COM ").unwrap(), "acme.com");
        assert!(domain("shop.acme.co.uk").is_ok());
        assert!(domain("www.acme.com").is_err());
        assert!(domain("acme").is_err());
        assert!(domain("-acme.com").is_err());
        assert!(domain("acme.com; rm -rf /").is_err());
        assert!(domain("acme.com\nserver_name evil").is_err());
    }

    #[test]
    fn emails() {
        assert!(email("ops@acme.com").is_ok());
        assert!(email("ops+certs@mail.acme.com").is_ok());
        assert!(email("ops@acme").is_err());
        assert!(email("--agree-tos").is_err());
        assert!(email("a b@acme.com").is_err());
    }

    #[test]
    fn slugs_and_paths() {
        assert!(slug("acme-dental").is_ok());
        let long_name = "Dental ".repeat(30);
        let generated = crate::services::slug::unique_slug(
            &crate::services::slug::slugify(&long_name),
            |s| !s.ends_with("-1"),
        );
        assert!(generated.len() > 63);
        assert!(slug(&generated).is_ok());
        assert!(slug(&"a".repeat(MAX_SLUG_LEN + 1)).is_err());
        assert!(slug("../acme").is_err());
        assert!(slug("Acme").is_err());

        assert!(web_root("/var/www/acme/dist").is_ok());
        assert!(web_root("var/www").is_err());
        assert!(web_root("/var/www/../etc").is_err());
        assert!(web_root("/var/www;").is_err());
    }

    #[test]
    fn backend_origins() {
        assert_eq!(
            backend_origin("http://127.0.0.1:3000").unwrap(),
            "http://127.0.0.1:3000"
        );
        assert!(backend_origin("http://api.internal/").is_ok());
        assert!(backend_origin("http://api.internal/v1").is_err());
        assert!(backend_origin("ftp://api.internal").is_err());
        assert!(backend_origin("http://user:pw@api.internal").is_err());
    }
}
