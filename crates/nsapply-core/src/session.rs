//! Apply session entry points.
//!
//! An [`ApplySession`] owns the invocation options and the collaborator
//! seams, and exposes the three ways a run can be scoped: one namespace, the
//! namespaces touched by a merged change request, every namespace, or a
//! deterministic batch slice.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::applier::Applier;
use crate::batch::{folder_chunks, list_namespace_dirs};
use crate::changes::resolve_changed_namespaces;
use crate::dispatch::BoundedDispatcher;
use crate::error::{ApplyError, Result};
use crate::git;
use crate::notify::Notifier;
use crate::options::Options;
use crate::pipeline::{ApplyResult, ApplyTask, NamespaceApplyPipeline, PipelineContext};
use crate::scm::SourceControlClient;

/// One apply/delete invocation over a cluster repository checkout.
pub struct ApplySession {
    options: Options,
    repo_root: PathBuf,
    applier: Arc<dyn Applier>,
    scm: Arc<dyn SourceControlClient>,
    notifier: Arc<dyn Notifier>,
    refresh_checkout: bool,
}

impl ApplySession {
    pub fn new(
        options: Options,
        repo_root: impl Into<PathBuf>,
        applier: Arc<dyn Applier>,
        scm: Arc<dyn SourceControlClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            options,
            repo_root: repo_root.into(),
            applier,
            scm,
            notifier,
            refresh_checkout: true,
        }
    }

    /// Skip the per-task git refresh. For checkouts that are not tracking an
    /// upstream, and for tests.
    pub fn without_checkout_refresh(mut self) -> Self {
        self.refresh_checkout = false;
        self
    }

    fn cluster_root(&self) -> PathBuf {
        self.repo_root.join(self.options.namespace_root())
    }

    fn pipeline(&self, only_skip_file_changed: bool) -> NamespaceApplyPipeline {
        let ctx = PipelineContext::from_options(&self.options, only_skip_file_changed);
        NamespaceApplyPipeline::new(Arc::clone(&self.applier), Arc::clone(&self.notifier), ctx)
    }

    /// Apply either the single configured namespace, or every namespace
    /// touched by the configured merged change request.
    ///
    /// The single-namespace path propagates its error unmodified. The
    /// change-request path dispatches concurrently and collects every
    /// per-namespace outcome; it succeeds even when individual namespaces
    /// failed.
    pub async fn apply(&self) -> Result<Vec<ApplyResult>> {
        if self.options.namespace.is_none() && self.options.pr_number == 0 {
            return Err(ApplyError::InvalidInput(
                "either a merged PR number or a namespace is required to perform apply".to_string(),
            ));
        }

        if let Some(namespace) = &self.options.namespace {
            let task = ApplyTask::new(namespace, self.cluster_root().join(namespace));
            let result = self.pipeline(false).run_gated(&task).await?;
            return Ok(vec![result]);
        }

        let pr_number = self.options.pr_number;
        if !self.scm.is_merged(pr_number).await? {
            info!(pr_number, "change request is not merged, nothing to apply");
            return Ok(Vec::new());
        }

        let changed = self.scm.changed_files(pr_number).await?;
        let root = self.options.namespace_root();
        let change_set = resolve_changed_namespaces(&changed, &root.to_string_lossy())?;
        if change_set.is_empty() {
            info!(pr_number, "change request touched no namespaces");
            return Ok(Vec::new());
        }

        info!(
            pr_number,
            namespaces = ?change_set.namespaces,
            "applying namespaces changed in merged request"
        );

        let cluster_root = self.cluster_root();
        let tasks: Vec<ApplyTask> = change_set
            .namespaces
            .iter()
            .map(|ns| ApplyTask::new(ns, cluster_root.join(ns)))
            .collect();

        Ok(self.dispatch(tasks, change_set.only_skip_file_changed).await)
    }

    /// Apply every namespace in the cluster directory.
    pub async fn apply_all(&self) -> Result<Vec<ApplyResult>> {
        let dirs = list_namespace_dirs(&self.cluster_root())?;
        let tasks: Vec<ApplyTask> = dirs.into_iter().map(ApplyTask::from_dir).collect();
        Ok(self.dispatch(tasks, false).await)
    }

    /// Apply the configured deterministic batch slice of the namespace
    /// listing.
    pub async fn apply_batch(&self) -> Result<Vec<ApplyResult>> {
        let dirs = folder_chunks(
            &self.cluster_root(),
            self.options.batch_index,
            self.options.batch_size,
        )?;
        let tasks: Vec<ApplyTask> = dirs.into_iter().map(ApplyTask::from_dir).collect();
        Ok(self.dispatch(tasks, false).await)
    }

    /// Delete the single configured namespace's resources.
    pub async fn delete(&self) -> Result<String> {
        let namespace = self.options.namespace.as_ref().ok_or_else(|| {
            ApplyError::InvalidInput("a namespace is required to perform delete".to_string())
        })?;
        let task = ApplyTask::new(namespace, self.cluster_root().join(namespace));
        self.pipeline(false).delete(&task).await
    }

    async fn dispatch(&self, tasks: Vec<ApplyTask>, only_skip_file_changed: bool) -> Vec<ApplyResult> {
        let pipeline = Arc::new(self.pipeline(only_skip_file_changed));
        let repo_root = self.repo_root.clone();
        let refresh = self.refresh_checkout;

        let dispatcher = BoundedDispatcher::new(self.options.dispatch_width);
        let results = dispatcher
            .run(tasks, move |task| {
                let pipeline = Arc::clone(&pipeline);
                let repo_root = repo_root.clone();
                async move {
                    if refresh {
                        // Pick up skip/blocker markers merged since the batch
                        // started. Siblings share the checkout, so a lock
                        // collision just means someone else already pulled.
                        match git::pull_latest(&repo_root).await {
                            Ok(()) => {}
                            Err(ApplyError::GitLocked(_)) => {
                                warn!(
                                    namespace = %task.namespace,
                                    "ignoring git lock contention during parallel run"
                                );
                            }
                            Err(err) => {
                                return ApplyResult::failed(&task.namespace, &err);
                            }
                        }
                    }
                    pipeline.apply(&task).await
                }
            })
            .await;

        let errored: Vec<&str> = results
            .iter()
            .filter(|r| !r.succeeded)
            .map(|r| r.namespace.as_str())
            .collect();
        if errored.is_empty() {
            info!(total = results.len(), "all namespaces applied");
        } else {
            warn!(total = results.len(), ?errored, "some namespaces failed to apply");
        }

        results
    }
}
