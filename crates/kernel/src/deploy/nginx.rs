//! NGINX server block generation.

use anyhow::{Context, Result};
use serde::Serialize;
use tera::Tera;

const TEMPLATE_NAME: &str = "tenant.conf";

/// Server block for one tenant. With `ssl` the HTTP server only answers ACME
/// challenges and redirects; the HTTPS server serves the site.
const TEMPLATE: &str = r#"# Managed by Tessera for tenant {{ tenant_slug }} (id {{ tenant_id }}). Changes are overwritten.
server {
    listen 80;
    listen [::]:80;
    server_name {{ domain }} www.{{ domain }};
{% if ssl %}
    location /.well-known/acme-challenge/ {
        root {{ web_root }};
    }

    location / {
        return 301 https://$host$request_uri;
    }
}

server {
    listen 443 ssl;
    listen [::]:443 ssl;
    http2 on;
    server_name {{ domain }} www.{{ domain }};

    ssl_certificate {{ letsencrypt_dir }}/live/{{ domain }}/fullchain.pem;
    ssl_certificate_key {{ letsencrypt_dir }}/live/{{ domain }}/privkey.pem;
    include {{ letsencrypt_dir }}/options-ssl-nginx.conf;
    ssl_dhparam {{ letsencrypt_dir }}/ssl-dhparams.pem;
{% endif %}
    root {{ web_root }};
    index index.html;

    location = /health {
        access_log off;
        default_type text/plain;
        return 200 "ok\n";
    }

    location ~* \.(?:css|js|mjs|png|jpe?g|gif|svg|webp|avif|ico|woff2?)$ {
        expires 30d;
        add_header Cache-Control "public, max-age=2592000, immutable";
        try_files $uri =404;
    }

    location /api/ {
        proxy_pass {{ backend_origin }};
        proxy_http_version 1.1;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_set_header X-Tenant-Domain {{ domain }};
    }

    location / {
        try_files $uri $uri/ /index.html;
    }
}
"#;

/// Values substituted into the template. All fields must already be
/// validated; the template does no escaping.
#[derive(Debug, Clone, Serialize)]
pub struct SiteConfig {
    pub tenant_id: i64,
    pub tenant_slug: String,
    pub domain: String,
    pub web_root: String,
    pub backend_origin: String,
    pub letsencrypt_dir: String,
    pub ssl: bool,
}

/// Renders tenant server blocks.
#[derive(Debug, Clone)]
pub struct NginxRenderer {
    tera: Tera,
}

impl NginxRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)
            .context("failed to parse nginx template")?;
        // Config files are not HTML
        tera.autoescape_on(vec![]);
        Ok(Self { tera })
    }

    pub fn render(&self, site: &SiteConfig) -> Result<String> {
        let context =
            tera::Context::from_serialize(site).context("failed to build nginx template context")?;
        self.tera
            .render(TEMPLATE_NAME, &context)
            .context("failed to render nginx config")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn site(ssl: bool) -> SiteConfig {
        SiteConfig {
            tenant_id: 4,
            tenant_slug: "acme".into(),
            domain: "acme.com".into(),
            web_root: "/var/www/acme/dist".into(),
            backend_origin: "http://127.0.0.1:3000".into(),
            letsencrypt_dir: "/etc/letsencrypt".into(),
            ssl,
        }
    }

    #[test]
    fn http_only_variant_serves_site_on_port_80() {
        let config = NginxRenderer::new().unwrap().render(&site(false)).unwrap();

        assert_eq!(config.matches("server {").count(), 1);
        assert!(config.contains("server_name acme.com www.acme.com;"));
        assert!(config.contains("root /var/www/acme/dist;"));
        assert!(config.contains("location = /health"));
        assert!(config.contains("proxy_set_header X-Tenant-Domain acme.com;"));
        assert!(!config.contains("ssl_certificate"));
        assert!(!config.contains("return 301"));
    }

    #[test]
    fn ssl_variant_redirects_and_serves_https() {
        let config = NginxRenderer::new().unwrap().render(&site(true)).unwrap();

        assert_eq!(config.matches("server {").count(), 2);
        assert!(config.contains("return 301 https://$host$request_uri;"));
        assert!(config.contains("listen 443 ssl;"));
        assert!(config.contains("ssl_certificate /etc/letsencrypt/live/acme.com/fullchain.pem;"));
        assert!(config.contains("ssl_certificate_key /etc/letsencrypt/live/acme.com/privkey.pem;"));
        assert!(config.contains("proxy_pass http://127.0.0.1:3000;"));
        assert!(config.contains("expires 30d;"));
    }
}
