//! Tenant deployment: NGINX server blocks and Let's Encrypt certificates.
//!
//! Every step validates its inputs first, passes argv vectors to
//! subprocesses and reports a [`DeployOutcome`] instead of an error.
//! The only rollback is deleting a config that fails `nginx -t`.

pub mod command;
pub mod nginx;
pub mod validate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use nginx::{NginxRenderer, SiteConfig};
pub use validate::InvalidInput;

use crate::config::DeployConfig;
use crate::metrics::Metrics;

const NGINX_TEST_MARKERS: &[&str] = &["syntax is ok", "test is successful"];
const CERTBOT_MARKERS: &[&str] = &[
    "congratulations",
    "successfully deployed certificate",
    "certificate not yet due for renewal",
];

/// Result reported to API and CLI callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployOutcome {
    pub success: bool,
    pub message: String,
    /// Rendered config, returned by dry runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

impl DeployOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            config: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            config: None,
        }
    }
}

/// What to deploy.
#[derive(Debug, Clone)]
pub struct DeployTarget {
    pub tenant_id: i64,
    pub tenant_slug: String,
    pub domain: String,
}

/// How to deploy it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeployOptions {
    /// Request a certificate with certbot after the HTTP config is live.
    #[serde(default)]
    pub issue_certificate: bool,
    /// Overrides the configured certbot contact address.
    pub email: Option<String>,
    /// Render and return the config without touching disk.
    #[serde(default)]
    pub dry_run: bool,
}

/// Generates, installs and activates tenant server blocks.
#[derive(Clone)]
pub struct DeployService {
    config: DeployConfig,
    renderer: NginxRenderer,
    runner: Arc<dyn CommandRunner>,
    metrics: Arc<Metrics>,
}

impl DeployService {
    pub fn new(
        config: DeployConfig,
        runner: Arc<dyn CommandRunner>,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            renderer: NginxRenderer::new()?,
            runner,
            metrics,
        })
    }

    /// Path the tenant's server block is written to.
    pub fn config_path(&self, tenant_slug: &str) -> PathBuf {
        self.config.sites_dir.join(format!("{tenant_slug}.conf"))
    }

    /// Whether a certificate for `domain` is already on disk.
    pub async fn certificate_exists(&self, domain: &str) -> bool {
        let chain = self
            .config
            .letsencrypt_dir
            .join("live")
            .join(domain)
            .join("fullchain.pem");
        tokio::fs::metadata(&chain)
            .await
            .is_ok_and(|meta| meta.is_file())
    }

    /// Validate the target and build template values.
    pub fn site_config(&self, target: &DeployTarget, ssl: bool) -> Result<SiteConfig, InvalidInput> {
        let slug = validate::slug(&target.tenant_slug)?;
        let domain = validate::domain(&target.domain)?;
        let web_root = self.config.web_root.replace("{slug}", slug);
        validate::web_root(&web_root)?;
        let backend_origin = validate::backend_origin(&self.config.backend_origin)?;

        Ok(SiteConfig {
            tenant_id: target.tenant_id,
            tenant_slug: slug.to_string(),
            domain,
            web_root,
            backend_origin,
            letsencrypt_dir: self.config.letsencrypt_dir.display().to_string(),
            ssl,
        })
    }

    /// Deploy `target`, recording the outcome in metrics.
    pub async fn deploy(&self, target: &DeployTarget, options: &DeployOptions) -> DeployOutcome {
        let outcome = self.run(target, options).await;
        if !options.dry_run {
            self.metrics.record_deploy(outcome.success);
        }
        info!(
            tenant_id = target.tenant_id,
            domain = %target.domain,
            success = outcome.success,
            dry_run = options.dry_run,
            "deploy finished"
        );
        outcome
    }

    async fn run(&self, target: &DeployTarget, options: &DeployOptions) -> DeployOutcome {
        let email = if options.issue_certificate {
            let Some(raw) = options.email.as_ref().or(self.config.certbot_email.as_ref()) else {
                return DeployOutcome::failed("an email address is required to issue a certificate");
            };
            match validate::email(raw) {
                Ok(email) => Some(email),
                Err(e) => return DeployOutcome::failed(e.to_string()),
            }
        } else {
            None
        };

        let mut site = match self.site_config(target, false) {
            Ok(site) => site,
            Err(e) => return DeployOutcome::failed(e.to_string()),
        };
        site.ssl = self.certificate_exists(&site.domain).await;

        if options.dry_run {
            return match self.renderer.render(&site) {
                Ok(config) => DeployOutcome {
                    config: Some(config),
                    ..DeployOutcome::ok("dry run: config rendered, nothing written")
                },
                Err(e) => DeployOutcome::failed(format!("{e:#}")),
            };
        }

        if let Err(outcome) = self.install(&site).await {
            return outcome;
        }

        if !options.issue_certificate || site.ssl {
            let variant = if site.ssl { "https" } else { "http" };
            return DeployOutcome::ok(format!(
                "{} deployed ({variant})",
                self.config_path(&site.tenant_slug).display()
            ));
        }

        let Some(email) = email else {
            return DeployOutcome::failed("an email address is required to issue a certificate");
        };
        let certbot = self.certbot(&site.domain, &email).await;
        if !certbot.success {
            return certbot;
        }

        // Replace certbot's edits with the managed HTTPS variant
        site.ssl = true;
        if let Err(outcome) = self.install(&site).await {
            return outcome;
        }
        DeployOutcome::ok(format!("certificate issued and https enabled for {}", site.domain))
    }

    /// Write, test and reload. Failure leaves no config behind.
    async fn install(&self, site: &SiteConfig) -> Result<(), DeployOutcome> {
        let config = self
            .renderer
            .render(site)
            .map_err(|e| DeployOutcome::failed(format!("{e:#}")))?;
        let path = self.config_path(&site.tenant_slug);

        if let Some(parent) = path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Err(DeployOutcome::failed(format!(
                "failed to create {}: {e}",
                parent.display()
            )));
        }
        if let Err(e) = tokio::fs::write(&path, config).await {
            return Err(DeployOutcome::failed(format!(
                "failed to write {}: {e}",
                path.display()
            )));
        }

        let test = self.nginx(&["-t"]).await;
        let passed = matches!(&test, Ok(out) if out.success && out.mentions(NGINX_TEST_MARKERS));
        if !passed {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(error = %e, path = %path.display(), "failed to remove rejected nginx config");
            }
            let detail = match test {
                Ok(out) => out.combined(),
                Err(e) => format!("{e:#}"),
            };
            return Err(DeployOutcome::failed(format!("nginx -t failed: {detail}")));
        }

        match self.nginx(&["-s", "reload"]).await {
            Ok(out) if out.success => Ok(()),
            Ok(out) => Err(DeployOutcome::failed(format!(
                "nginx reload failed: {}",
                out.combined()
            ))),
            Err(e) => Err(DeployOutcome::failed(format!("nginx reload failed: {e:#}"))),
        }
    }

    async fn nginx(&self, args: &[&str]) -> anyhow::Result<CommandOutput> {
        let args: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
        self.runner
            .run(
                &self.config.nginx_bin,
                &args,
                Duration::from_secs(self.config.nginx_timeout_secs),
            )
            .await
    }

    async fn certbot(&self, domain: &str, email: &str) -> DeployOutcome {
        let args = certbot_args(domain, email);
        let timeout = Duration::from_secs(self.config.certbot_timeout_secs);

        match self.runner.run(&self.config.certbot_bin, &args, timeout).await {
            Ok(out) if out.success && out.mentions(CERTBOT_MARKERS) => {
                DeployOutcome::ok(format!("certificate issued for {domain}"))
            }
            Ok(out) => DeployOutcome::failed(format!("certbot failed: {}", out.combined())),
            Err(e) => DeployOutcome::failed(format!("certbot failed: {e:#}")),
        }
    }
}

impl std::fmt::Debug for DeployService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployService")
            .field("sites_dir", &self.config.sites_dir)
            .finish()
    }
}

/// Arguments of the certbot invocation for `domain`.
pub fn certbot_args(domain: &str, email: &str) -> Vec<String> {
    [
        "--nginx",
        "-d",
        domain,
        "-d",
        &format!("www.{domain}"),
        "--email",
        email,
        "--non-interactive",
        "--agree-tos",
        "--redirect",
    ]
    .iter()
    .map(|a| (*a).to_string())
    .collect()
}
