//! Subprocess execution for deployment steps.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Captured result of one finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout and stderr joined, trimmed.
    pub fn combined(&self) -> String {
        let joined = format!("{}\n{}", self.stdout.trim(), self.stderr.trim());
        joined.trim().to_string()
    }

    /// Whether either stream contains any of `markers`, case-insensitively.
    pub fn mentions(&self, markers: &[&str]) -> bool {
        let text = self.combined().to_lowercase();
        markers.iter().any(|m| text.contains(&m.to_lowercase()))
    }
}

/// Runs a program with an argv vector. Never goes through a shell.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, failing if it outlives `timeout`.
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput>;
}

/// Runs real processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        debug!(program, ?args, "running command");

        let output = tokio::time::timeout(
            timeout,
            tokio::process::Command::new(program)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .with_context(|| format!("{program} timed out after {}s", timeout.as_secs()))?
        .with_context(|| format!("failed to run {program}"))?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn combined_and_markers() {
        let output = CommandOutput {
            success: true,
            stdout: String::new(),
            stderr: "nginx: configuration file /etc/nginx/nginx.conf test is successful\n".into(),
        };
        assert!(output.combined().starts_with("nginx:"));
        assert!(output.mentions(&["Test Is Successful"]));
        assert!(!output.mentions(&["congratulations"]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_captures_output() {
        let output = SystemCommandRunner
            .run("echo", &["hello".to_string()], Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_enforces_timeout() {
        let result = SystemCommandRunner
            .run("sleep", &["5".to_string()], Duration::from_millis(50))
            .await;
        assert!(result.is_err());
    }
}
