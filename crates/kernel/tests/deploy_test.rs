#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Deployment flow against a scripted command runner.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tessera_kernel::deploy::{
    CommandOutput, CommandRunner, DeployOptions, DeployService, DeployTarget,
};
use tessera_kernel::metrics::{Metrics, OutcomeLabels};
use tessera_test_utils::assert;

/// Records every invocation and answers from canned outputs.
#[derive(Default)]
struct ScriptedRunner {
    calls: Mutex<Vec<String>>,
    nginx_test_ok: bool,
    certbot_ok: bool,
}

impl ScriptedRunner {
    fn healthy() -> Self {
        Self {
            nginx_test_ok: true,
            certbot_ok: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        _timeout: Duration,
    ) -> anyhow::Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{program} {}", args.join(" ")));

        let output = match (program, args.first().map(String::as_str)) {
            ("nginx", Some("-t")) if self.nginx_test_ok => CommandOutput {
                success: true,
                stdout: String::new(),
                stderr: "nginx: configuration file test is successful".into(),
            },
            ("nginx", Some("-t")) => CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: "nginx: [emerg] unexpected \"}\"".into(),
            },
            ("certbot", _) if self.certbot_ok => CommandOutput {
                success: true,
                stdout: "Congratulations! You have successfully enabled HTTPS".into(),
                stderr: String::new(),
            },
            ("certbot", _) => CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: "Challenge failed for domain acme.com".into(),
            },
            _ => CommandOutput {
                success: true,
                ..CommandOutput::default()
            },
        };
        Ok(output)
    }
}

fn service(dir: &std::path::Path, runner: Arc<ScriptedRunner>) -> (DeployService, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let service = DeployService::new(common::deploy_config(dir), runner, metrics.clone()).unwrap();
    (service, metrics)
}

fn target(domain: &str) -> DeployTarget {
    DeployTarget {
        tenant_id: 7,
        tenant_slug: "acme".to_string(),
        domain: domain.to_string(),
    }
}

#[tokio::test]
async fn dry_run_renders_without_touching_disk() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::healthy());
    let (service, _) = service(dir.path(), runner.clone());

    let options = DeployOptions {
        dry_run: true,
        ..DeployOptions::default()
    };
    let outcome = service.deploy(&target("acme.com"), &options).await;

    assert!(outcome.success, "{}", outcome.message);
    let config = outcome.config.unwrap();
    assert::contains(&config, "server_name acme.com www.acme.com;");
    assert::contains(&config, "/var/www/acme/dist");
    assert::not_contains(&config, "ssl_certificate");
    assert!(!service.config_path("acme").exists());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn http_deploy_writes_tests_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::healthy());
    let (service, metrics) = service(dir.path(), runner.clone());

    let outcome = service
        .deploy(&target("Acme.com"), &DeployOptions::default())
        .await;

    assert!(outcome.success, "{}", outcome.message);
    assert!(outcome.message.contains("(http)"));
    let written = std::fs::read_to_string(service.config_path("acme")).unwrap();
    assert!(written.contains("server_name acme.com www.acme.com;"));
    assert_eq!(runner.calls(), ["nginx -t", "nginx -s reload"]);
    let succeeded = OutcomeLabels {
        outcome: "success".to_string(),
    };
    assert_eq!(metrics.deploys.get_or_create(&succeeded).get(), 1);
}

#[tokio::test]
async fn existing_certificate_deploys_https_without_certbot() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("letsencrypt").join("live").join("acme.com");
    std::fs::create_dir_all(&live).unwrap();
    std::fs::write(live.join("fullchain.pem"), "cert").unwrap();

    let runner = Arc::new(ScriptedRunner::healthy());
    let (service, _) = service(dir.path(), runner.clone());
    assert!(service.certificate_exists("acme.com").await);
    assert!(!service.certificate_exists("other.com").await);

    let outcome = service
        .deploy(&target("acme.com"), &DeployOptions::default())
        .await;

    assert!(outcome.success, "{}", outcome.message);
    assert!(outcome.message.contains("(https)"));
    let written = std::fs::read_to_string(service.config_path("acme")).unwrap();
    assert!(written.contains("ssl_certificate"));
    assert_eq!(runner.calls(), ["nginx -t", "nginx -s reload"]);
}

#[tokio::test]
async fn failed_config_test_removes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner {
        nginx_test_ok: false,
        ..ScriptedRunner::default()
    });
    let (service, _) = service(dir.path(), runner.clone());

    let outcome = service
        .deploy(&target("acme.com"), &DeployOptions::default())
        .await;

    assert!(!outcome.success);
    assert!(outcome.message.starts_with("nginx -t failed"));
    assert!(!service.config_path("acme").exists());
    assert_eq!(runner.calls(), ["nginx -t"]);
}

#[tokio::test]
async fn certificate_issue_switches_to_https() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::healthy());
    let (service, _) = service(dir.path(), runner.clone());

    let options = DeployOptions {
        issue_certificate: true,
        email: Some("ops@acme.com".to_string()),
        dry_run: false,
    };
    let outcome = service.deploy(&target("acme.com"), &options).await;

    assert!(outcome.success, "{}", outcome.message);
    let written = std::fs::read_to_string(service.config_path("acme")).unwrap();
    assert::contains(&written, "ssl_certificate");
    assert::contains(&written, "return 301 https://");

    let calls = runner.calls();
    assert_eq!(calls.len(), 5);
    assert!(calls[2].starts_with("certbot --nginx -d acme.com -d www.acme.com"));
}

#[tokio::test]
async fn certbot_failure_keeps_http_config() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner {
        nginx_test_ok: true,
        certbot_ok: false,
        ..ScriptedRunner::default()
    });
    let (service, _) = service(dir.path(), runner.clone());

    let options = DeployOptions {
        issue_certificate: true,
        email: Some("ops@acme.com".to_string()),
        dry_run: false,
    };
    let outcome = service.deploy(&target("acme.com"), &options).await;

    assert!(!outcome.success);
    assert!(outcome.message.contains("Challenge failed"));
    let written = std::fs::read_to_string(service.config_path("acme")).unwrap();
    assert::not_contains(&written, "ssl_certificate");
}

#[tokio::test]
async fn invalid_input_never_reaches_a_subprocess() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::healthy());
    let (service, _) = service(dir.path(), runner.clone());

    let outcome = service
        .deploy(&target("acme.com; rm -rf /"), &DeployOptions::default())
        .await;
    assert!(!outcome.success);

    let options = DeployOptions {
        issue_certificate: true,
        email: None,
        dry_run: false,
    };
    let outcome = service.deploy(&target("acme.com"), &options).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("email"));

    assert!(runner.calls().is_empty());
}
