//! Integration tests for batch slicing and the bounded dispatcher driving
//! real pipeline runs over a seeded cluster directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use nsapply_core::fakes::{MockApplier, MockNotifier, MockScmClient};
use nsapply_core::{
    chunk, list_namespace_dirs, ApplySession, ApplyTask, BoundedDispatcher, NamespaceApplyPipeline,
    Options, PipelineContext,
};

fn seed_cluster(repo_root: &Path, namespaces: &[&str]) {
    for name in namespaces {
        let dir = repo_root.join("namespaces/live").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("00-namespace.yaml"), "kind: Namespace").unwrap();
    }
}

fn options() -> Options {
    Options {
        cluster_dir: "live".to_string(),
        kubecfg_path: PathBuf::from("/tmp/kubecfg"),
        pr_number: 7,
        build_url: "https://ci.example/builds/1".to_string(),
        ..Options::default()
    }
}

fn context() -> PipelineContext {
    PipelineContext::from_options(&options(), false)
}

/// Test: width 3 over 10 tasks returns exactly 10 results with at most 3
/// applier calls in flight at any moment.
#[tokio::test]
async fn test_dispatcher_bounds_concurrent_applier_calls() {
    let repo = tempfile::tempdir().unwrap();
    let names: Vec<String> = (0..10).map(|i| format!("team-{i}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    seed_cluster(repo.path(), &name_refs);

    let applier = Arc::new(MockApplier::with_delay(Duration::from_millis(25)));
    let notifier = Arc::new(MockNotifier::new());
    let pipeline = Arc::new(NamespaceApplyPipeline::new(
        applier.clone(),
        notifier,
        context(),
    ));

    let tasks: Vec<ApplyTask> = names
        .iter()
        .map(|ns| ApplyTask::new(ns, repo.path().join("namespaces/live").join(ns)))
        .collect();

    let dispatcher = BoundedDispatcher::new(3);
    let runner = Arc::clone(&pipeline);
    let results = dispatcher
        .run(tasks, move |task| {
            let runner = Arc::clone(&runner);
            async move { runner.apply(&task).await }
        })
        .await;

    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| r.succeeded));
    assert_eq!(applier.call_count(), 10);
    assert!(
        applier.max_in_flight() <= 3,
        "saw {} concurrent calls",
        applier.max_in_flight()
    );
}

/// Test: one namespace failing leaves every other outcome in the final
/// report; the batch call itself succeeds.
#[tokio::test]
async fn test_partial_failures_are_aggregated_not_fatal() {
    let repo = tempfile::tempdir().unwrap();
    seed_cluster(repo.path(), &["team-a", "team-b", "team-c"]);

    let applier = Arc::new(MockApplier::new());
    applier.fail_manifests_for("team-b");
    let scm = MockScmClient::merged_with_files(&[
        "namespaces/live/team-a/00-namespace.yaml",
        "namespaces/live/team-b/00-namespace.yaml",
        "namespaces/live/team-c/00-namespace.yaml",
    ]);
    let session = ApplySession::new(
        options(),
        repo.path(),
        applier,
        Arc::new(scm),
        Arc::new(MockNotifier::new()),
    )
    .without_checkout_refresh();

    let results = session.apply().await.expect("batch apply should not abort");
    assert_eq!(results.len(), 3);
    let failed: Vec<_> = results
        .iter()
        .filter(|r| !r.succeeded)
        .map(|r| r.namespace.as_str())
        .collect();
    assert_eq!(failed, vec!["team-b"]);
}

/// Test: concatenating every valid chunk reconstructs the sorted listing
/// with no overlap and no gaps.
#[tokio::test]
async fn test_chunks_partition_the_cluster_listing() {
    let repo = tempfile::tempdir().unwrap();
    seed_cluster(repo.path(), &["a", "b", "c", "d", "e", "f", "g"]);

    let cluster_root = repo.path().join("namespaces/live");
    let listing = list_namespace_dirs(&cluster_root).unwrap();
    assert_eq!(listing.len(), 7);

    let size = 3;
    let mut rebuilt = Vec::new();
    let mut index = 0;
    while let Ok(part) = chunk(&listing, index, size) {
        rebuilt.extend(part);
        index += 1;
    }
    assert_eq!(rebuilt, listing);
    assert_eq!(index, 3);
}

/// Test: a batch run applies exactly the namespaces of its slice.
#[tokio::test]
async fn test_batch_session_applies_only_its_slice() {
    let repo = tempfile::tempdir().unwrap();
    seed_cluster(repo.path(), &["a", "b", "c", "d", "e"]);

    let applier = Arc::new(MockApplier::new());
    let session = ApplySession::new(
        Options {
            batch_index: 0,
            batch_size: 2,
            ..options()
        },
        repo.path(),
        applier.clone(),
        Arc::new(MockScmClient::unmerged()),
        Arc::new(MockNotifier::new()),
    )
    .without_checkout_refresh();

    let results = session.apply_batch().await.unwrap();
    let mut applied: Vec<_> = results.iter().map(|r| r.namespace.clone()).collect();
    applied.sort();
    assert_eq!(applied, vec!["a", "b"]);

    let mut called: Vec<_> = applier
        .calls()
        .iter()
        .map(|c| c.namespace.clone())
        .collect();
    called.sort();
    assert_eq!(called, vec!["a", "b"]);
}

/// Test: an out-of-range batch index fails before any dispatch.
#[tokio::test]
async fn test_out_of_range_batch_is_an_error() {
    let repo = tempfile::tempdir().unwrap();
    seed_cluster(repo.path(), &["a", "b"]);

    let applier = Arc::new(MockApplier::new());
    let session = ApplySession::new(
        Options {
            batch_index: 5,
            batch_size: 2,
            ..options()
        },
        repo.path(),
        applier.clone(),
        Arc::new(MockScmClient::unmerged()),
        Arc::new(MockNotifier::new()),
    )
    .without_checkout_refresh();

    assert!(matches!(
        session.apply_batch().await.unwrap_err(),
        nsapply_core::ApplyError::OutOfRange { .. }
    ));
    assert_eq!(applier.call_count(), 0);
}
