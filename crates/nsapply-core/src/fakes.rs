//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `MockApplier`, `MockNotifier`, and `MockScmClient` that satisfy
//! the trait contracts without spawning processes or touching the network.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::applier::Applier;
use crate::error::{ApplyError, Result};
use crate::notify::Notifier;
use crate::scm::{ChangedFile, SourceControlClient};

// ---------------------------------------------------------------------------
// MockApplier
// ---------------------------------------------------------------------------

/// One recorded applier invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub op: &'static str,
    pub namespace: String,
}

/// Applier fake recording every invocation, with scripted per-namespace
/// failures and in-flight accounting for concurrency assertions.
#[derive(Debug, Default)]
pub struct MockApplier {
    calls: Mutex<Vec<RecordedCall>>,
    fail_manifests: Mutex<HashSet<String>>,
    fail_infra: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each call open for `delay` so concurrent calls overlap.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Script a manifest-apply failure for `namespace`.
    pub fn fail_manifests_for(&self, namespace: &str) {
        self.fail_manifests
            .lock()
            .unwrap()
            .insert(namespace.to_string());
    }

    /// Script an infra-apply failure for `namespace`.
    pub fn fail_infra_for(&self, namespace: &str) {
        self.fail_infra
            .lock()
            .unwrap()
            .insert(namespace.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn record(&self, op: &'static str, namespace: &str, fail: bool) -> Result<String> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().unwrap().push(RecordedCall {
            op,
            namespace: namespace.to_string(),
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if fail {
            return Err(ApplyError::ExternalTool {
                namespace: namespace.to_string(),
                detail: format!("scripted {op} failure"),
            });
        }
        Ok(format!("{op} ok for {namespace}"))
    }
}

#[async_trait]
impl Applier for MockApplier {
    async fn apply_manifests(&self, namespace: &str, _dir: &Path, _dry_run: bool) -> Result<String> {
        let fail = self.fail_manifests.lock().unwrap().contains(namespace);
        self.record("apply_manifests", namespace, fail).await
    }

    async fn delete_manifests(
        &self,
        namespace: &str,
        _dir: &Path,
        _dry_run: bool,
    ) -> Result<String> {
        let fail = self.fail_manifests.lock().unwrap().contains(namespace);
        self.record("delete_manifests", namespace, fail).await
    }

    async fn apply_infra(&self, namespace: &str, _dir: &Path, _kubecfg: &Path) -> Result<String> {
        let fail = self.fail_infra.lock().unwrap().contains(namespace);
        self.record("apply_infra", namespace, fail).await
    }

    async fn delete_infra(&self, namespace: &str, _dir: &Path, _kubecfg: &Path) -> Result<String> {
        let fail = self.fail_infra.lock().unwrap().contains(namespace);
        self.record("delete_infra", namespace, fail).await
    }
}

// ---------------------------------------------------------------------------
// MockNotifier
// ---------------------------------------------------------------------------

/// Notifier fake recording every delivered notification.
#[derive(Debug, Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<(u64, String)>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(u64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, pr_number: u64, build_url: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((pr_number, build_url.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockScmClient
// ---------------------------------------------------------------------------

/// Source-control fake with a scripted merge state and changed-file list.
#[derive(Debug, Default)]
pub struct MockScmClient {
    merged: bool,
    files: Vec<ChangedFile>,
}

impl MockScmClient {
    pub fn merged_with_files(paths: &[&str]) -> Self {
        Self {
            merged: true,
            files: paths
                .iter()
                .map(|p| ChangedFile {
                    path: p.to_string(),
                })
                .collect(),
        }
    }

    pub fn unmerged() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SourceControlClient for MockScmClient {
    async fn is_merged(&self, _pr_number: u64) -> Result<bool> {
        Ok(self.merged)
    }

    async fn changed_files(&self, _pr_number: u64) -> Result<Vec<ChangedFile>> {
        Ok(self.files.clone())
    }
}
