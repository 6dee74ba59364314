//! Sequential per-namespace apply steps.
//!
//! One pipeline run applies a single namespace: manifest resources first,
//! then infrastructure resources, via the [`Applier`] collaborator. Failures
//! trigger a human notification unless suppressed, and successful infra
//! output passes the redaction filter before being surfaced.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::applier::Applier;
use crate::error::{ApplyError, Result};
use crate::notify::{should_notify, Notifier};
use crate::options::Options;
use crate::policy::{may_apply, GateDecision};
use crate::redact::redact_env;

/// One namespace to apply. Ephemeral, created per dispatch cycle.
#[derive(Debug, Clone)]
pub struct ApplyTask {
    pub namespace: String,
    pub dir: PathBuf,
}

impl ApplyTask {
    pub fn new(namespace: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            namespace: namespace.into(),
            dir: dir.into(),
        }
    }

    /// Build a task from a namespace directory path; the directory name is
    /// the namespace.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let namespace = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { namespace, dir }
    }
}

/// Outcome of one namespace apply, produced exactly once per task.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub namespace: String,
    pub succeeded: bool,
    pub message: String,
}

impl ApplyResult {
    pub(crate) fn ok(namespace: &str, message: impl Into<String>) -> Self {
        Self {
            namespace: namespace.to_string(),
            succeeded: true,
            message: message.into(),
        }
    }

    pub(crate) fn failed(namespace: &str, err: &ApplyError) -> Self {
        Self {
            namespace: namespace.to_string(),
            succeeded: false,
            message: err.to_string(),
        }
    }
}

/// Immutable per-session context consumed by every pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub kubecfg_path: PathBuf,
    pub pr_number: u64,
    pub build_url: String,
    pub enable_apply_skip: bool,
    pub redact_output: bool,
    /// Operator-initiated skip: the change request was exactly the skip
    /// sentinel, so failure notifications are noise.
    pub only_skip_file_changed: bool,
    /// Unattended runs suppress notifications to avoid alert fatigue.
    pub is_apply_pipeline: bool,
}

impl PipelineContext {
    pub fn from_options(options: &Options, only_skip_file_changed: bool) -> Self {
        Self {
            kubecfg_path: options.kubecfg_path.clone(),
            pr_number: options.pr_number,
            build_url: options.build_url.clone(),
            enable_apply_skip: options.enable_apply_skip,
            redact_output: options.redact_output,
            only_skip_file_changed,
            is_apply_pipeline: options.is_apply_pipeline,
        }
    }
}

/// Sequential apply steps for one namespace.
pub struct NamespaceApplyPipeline {
    applier: Arc<dyn Applier>,
    notifier: Arc<dyn Notifier>,
    ctx: PipelineContext,
}

impl NamespaceApplyPipeline {
    pub fn new(
        applier: Arc<dyn Applier>,
        notifier: Arc<dyn Notifier>,
        ctx: PipelineContext,
    ) -> Self {
        Self {
            applier,
            notifier,
            ctx,
        }
    }

    /// Apply one namespace, folding soft skips and failures into an
    /// [`ApplyResult`]. Never panics or aborts siblings.
    pub async fn apply(&self, task: &ApplyTask) -> ApplyResult {
        match self.run_gated(task).await {
            Ok(result) => result,
            Err(err) => {
                warn!(namespace = %task.namespace, error = %err, "namespace apply failed");
                ApplyResult::failed(&task.namespace, &err)
            }
        }
    }

    /// Apply one namespace behind the policy gate, propagating hard errors.
    ///
    /// Soft conditions (missing directory, blocker/skip markers) are logged
    /// and become successful results. The gate is consulted here, per
    /// attempt, so markers added mid-batch are honored.
    pub async fn run_gated(&self, task: &ApplyTask) -> Result<ApplyResult> {
        match may_apply(&task.dir, self.ctx.enable_apply_skip) {
            GateDecision::SkipMissing => {
                info!(
                    namespace = %task.namespace,
                    "namespace directory does not exist, skipping apply"
                );
                Ok(ApplyResult::ok(
                    &task.namespace,
                    "skipped: namespace directory missing",
                ))
            }
            GateDecision::SkipBlocked => {
                info!(
                    namespace = %task.namespace,
                    "namespace has a blocker or skip marker, skipping apply"
                );
                Ok(ApplyResult::ok(
                    &task.namespace,
                    "skipped: blocked by sentinel marker",
                ))
            }
            GateDecision::Proceed => {
                let message = self.try_apply(task).await?;
                Ok(ApplyResult::ok(&task.namespace, message))
            }
        }
    }

    /// Apply one namespace, propagating the error unmodified to the caller.
    ///
    /// Manifests go first; a manifest failure short-circuits the pipeline and
    /// the infra step is not attempted.
    pub async fn try_apply(&self, task: &ApplyTask) -> Result<String> {
        let mut steps = Vec::new();

        if has_yaml_files(&task.dir) {
            info!(namespace = %task.namespace, dir = %task.dir.display(), "applying manifests");
            match self
                .applier
                .apply_manifests(&task.namespace, &task.dir, false)
                .await
            {
                Ok(output) => {
                    debug!(namespace = %task.namespace, "kubectl output: {}", output.trim());
                    steps.push("manifests");
                }
                Err(err) => {
                    self.notify_failure(&task.namespace).await;
                    return Err(err);
                }
            }
        } else {
            debug!(
                namespace = %task.namespace,
                "no yaml resources, skipping manifest apply"
            );
        }

        let infra_dir = task.dir.join("resources");
        if infra_dir.exists() {
            // Guard against applying the wrong namespace's resources from a
            // stale working directory. Aborts before any external call.
            if !task.dir.to_string_lossy().contains(&task.namespace) {
                return Err(ApplyError::Consistency {
                    dir: task.dir.clone(),
                    namespace: task.namespace.clone(),
                });
            }

            info!(
                namespace = %task.namespace,
                dir = %infra_dir.display(),
                "applying infrastructure"
            );
            match self
                .applier
                .apply_infra(&task.namespace, &infra_dir, &self.ctx.kubecfg_path)
                .await
            {
                Ok(output) => {
                    let output = redact_env(&output, self.ctx.redact_output);
                    info!(namespace = %task.namespace, "terraform output: {}", output.trim());
                    steps.push("infra");
                }
                Err(err) => {
                    self.notify_failure(&task.namespace).await;
                    return Err(err);
                }
            }
        } else {
            debug!(
                namespace = %task.namespace,
                "no infra resources, skipping infra apply"
            );
        }

        if steps.is_empty() {
            Ok("nothing to apply".to_string())
        } else {
            Ok(format!("applied: {}", steps.join(", ")))
        }
    }

    /// Delete one namespace's resources: infra destroy first so in-cluster
    /// dependencies of the infra tooling still exist, then manifests.
    pub async fn delete(&self, task: &ApplyTask) -> Result<String> {
        if !task.dir.exists() {
            info!(namespace = %task.namespace, "namespace directory does not exist, nothing to delete");
            return Ok("nothing to delete".to_string());
        }

        let infra_dir = task.dir.join("resources");
        if infra_dir.exists() {
            if !task.dir.to_string_lossy().contains(&task.namespace) {
                return Err(ApplyError::Consistency {
                    dir: task.dir.clone(),
                    namespace: task.namespace.clone(),
                });
            }

            info!(namespace = %task.namespace, "destroying infrastructure");
            let output = self
                .applier
                .delete_infra(&task.namespace, &infra_dir, &self.ctx.kubecfg_path)
                .await?;
            debug!(namespace = %task.namespace, "terraform destroy output: {}", output.trim());
        }

        if has_yaml_files(&task.dir) {
            info!(namespace = %task.namespace, "deleting manifests");
            let output = self
                .applier
                .delete_manifests(&task.namespace, &task.dir, false)
                .await?;
            debug!(namespace = %task.namespace, "kubectl delete output: {}", output.trim());
        }

        Ok("deleted".to_string())
    }

    async fn notify_failure(&self, namespace: &str) {
        if self.ctx.only_skip_file_changed || self.ctx.is_apply_pipeline {
            debug!(namespace, "failure notification suppressed");
            return;
        }
        if !should_notify(self.ctx.pr_number, &self.ctx.build_url) {
            return;
        }
        if let Err(err) = self
            .notifier
            .notify(self.ctx.pr_number, &self.ctx.build_url)
            .await
        {
            warn!(namespace, error = %err, "failed to notify about apply failure");
        }
    }
}

/// Whether the directory directly contains manifest yaml files.
fn has_yaml_files(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.filter_map(|e| e.ok()).any(|entry| {
        let path = entry.path();
        matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        )
    })
}
