//! External apply-tool collaborator.
//!
//! The [`Applier`] trait is the seam between orchestration and the manifest /
//! infrastructure tools. [`ShellApplier`] is the production implementation
//! spawning `kubectl` and `terraform`; tests use the in-memory fake from
//! [`crate::fakes`].

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ApplyError, Result};

/// Captured output of one external tool invocation.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Manifest and infrastructure apply primitives for one namespace.
///
/// Both apply operations are idempotent in the underlying tools: re-applying
/// an unchanged namespace causes no additional external effect. The kube
/// access config is an explicit parameter of every infra call; it must never
/// travel through shared mutable process state, since workers running
/// concurrently may target different clusters.
#[async_trait]
pub trait Applier: Send + Sync {
    /// Apply the namespace's manifest resources. Returns tool stdout.
    async fn apply_manifests(&self, namespace: &str, dir: &Path, dry_run: bool) -> Result<String>;

    /// Delete the namespace's manifest resources. Returns tool stdout.
    async fn delete_manifests(&self, namespace: &str, dir: &Path, dry_run: bool) -> Result<String>;

    /// Init-then-apply the namespace's infrastructure resources.
    async fn apply_infra(&self, namespace: &str, dir: &Path, kubecfg: &Path) -> Result<String>;

    /// Init-then-destroy the namespace's infrastructure resources.
    async fn delete_infra(&self, namespace: &str, dir: &Path, kubecfg: &Path) -> Result<String>;
}

/// Production applier spawning kubectl and terraform.
#[derive(Debug, Clone)]
pub struct ShellApplier {
    kubectl_bin: PathBuf,
    terraform_bin: PathBuf,
}

impl ShellApplier {
    pub fn new(terraform_bin: impl Into<PathBuf>, kubectl_bin: impl Into<PathBuf>) -> Self {
        Self {
            kubectl_bin: kubectl_bin.into(),
            terraform_bin: terraform_bin.into(),
        }
    }

    async fn run_tool(
        &self,
        namespace: &str,
        bin: &Path,
        args: &[&str],
        dir: Option<&Path>,
        envs: &[(&str, &OsStr)],
    ) -> Result<CmdOutput> {
        let mut cmd = Command::new(bin);
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        for (key, value) in envs {
            cmd.env(key, value);
        }

        let output = cmd.output().await.map_err(|e| ApplyError::ExternalTool {
            namespace: namespace.to_string(),
            detail: format!("failed to spawn {}: {e}", bin.display()),
        })?;

        let out = CmdOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        if !output.status.success() {
            return Err(ApplyError::ExternalTool {
                namespace: namespace.to_string(),
                detail: format!(
                    "{} {} exited with code {}: {}",
                    bin.display(),
                    args.join(" "),
                    out.exit_code,
                    out.stderr.trim()
                ),
            });
        }

        Ok(out)
    }

    async fn kubectl(
        &self,
        namespace: &str,
        verb: &str,
        dir: &Path,
        dry_run: bool,
    ) -> Result<String> {
        let dir_arg = dir.to_string_lossy();
        let mut args = vec!["-n", namespace, verb, "-f", dir_arg.as_ref()];
        if dry_run {
            args.push("--dry-run=client");
        }

        let out = self
            .run_tool(namespace, &self.kubectl_bin, &args, None, &[])
            .await?;
        Ok(out.stdout)
    }

    async fn terraform(
        &self,
        namespace: &str,
        verb: &str,
        dir: &Path,
        kubecfg: &Path,
    ) -> Result<String> {
        // Terraform needs the kube access config to reach the target cluster;
        // scoped to the spawned process, not the parent environment.
        let envs = [("KUBE_CONFIG_PATH", kubecfg.as_os_str())];

        let init = self
            .run_tool(
                namespace,
                &self.terraform_bin,
                &["init", "-no-color"],
                Some(dir),
                &envs,
            )
            .await?;
        debug!(namespace, "terraform init output: {}", init.stdout.trim());

        let out = self
            .run_tool(
                namespace,
                &self.terraform_bin,
                &[verb, "-no-color", "-auto-approve"],
                Some(dir),
                &envs,
            )
            .await?;
        Ok(out.stdout)
    }
}

#[async_trait]
impl Applier for ShellApplier {
    async fn apply_manifests(&self, namespace: &str, dir: &Path, dry_run: bool) -> Result<String> {
        self.kubectl(namespace, "apply", dir, dry_run).await
    }

    async fn delete_manifests(&self, namespace: &str, dir: &Path, dry_run: bool) -> Result<String> {
        self.kubectl(namespace, "delete", dir, dry_run).await
    }

    async fn apply_infra(&self, namespace: &str, dir: &Path, kubecfg: &Path) -> Result<String> {
        self.terraform(namespace, "apply", dir, kubecfg).await
    }

    async fn delete_infra(&self, namespace: &str, dir: &Path, kubecfg: &Path) -> Result<String> {
        self.terraform(namespace, "destroy", dir, kubecfg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_tool_captures_stdout() {
        let applier = ShellApplier::new("terraform", "kubectl");
        let out = applier
            .run_tool("ns", Path::new("echo"), &["hello"], None, &[])
            .await
            .expect("echo should run");
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_tool_nonzero_exit_is_external_tool_error() {
        let applier = ShellApplier::new("terraform", "kubectl");
        let err = applier
            .run_tool("team-a", Path::new("false"), &[], None, &[])
            .await
            .unwrap_err();
        match err {
            ApplyError::ExternalTool { namespace, .. } => assert_eq!(namespace, "team-a"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_tool_missing_binary_is_external_tool_error() {
        let applier = ShellApplier::new("terraform", "kubectl");
        let err = applier
            .run_tool("ns", Path::new("/nonexistent/tool"), &[], None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::ExternalTool { .. }));
    }

    #[tokio::test]
    async fn test_run_tool_passes_env_to_child() {
        let applier = ShellApplier::new("terraform", "kubectl");
        let out = applier
            .run_tool(
                "ns",
                Path::new("sh"),
                &["-c", "printf '%s' \"$KUBE_CONFIG_PATH\""],
                None,
                &[("KUBE_CONFIG_PATH", OsStr::new("/tmp/kubecfg"))],
            )
            .await
            .unwrap();
        assert_eq!(out.stdout, "/tmp/kubecfg");
    }
}
