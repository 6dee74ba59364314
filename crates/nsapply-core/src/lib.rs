//! nsapply Core Library
//!
//! Orchestrates namespace apply runs across a multi-tenant GitOps cluster
//! repository: changed-namespace resolution, batch slicing, skip/blocker
//! policy gating, per-namespace apply pipelines and the bounded concurrent
//! dispatcher that fans them out.

pub mod applier;
pub mod batch;
pub mod changes;
pub mod dispatch;
pub mod error;
pub mod fakes;
pub mod git;
pub mod notify;
pub mod options;
pub mod pipeline;
pub mod policy;
pub mod redact;
pub mod scm;
pub mod session;
pub mod telemetry;

pub use applier::{Applier, CmdOutput, ShellApplier};
pub use batch::{chunk, folder_chunks, list_namespace_dirs};
pub use changes::{resolve_changed_namespaces, ChangeSet};
pub use dispatch::BoundedDispatcher;
pub use error::{ApplyError, Result};
pub use git::pull_latest;
pub use notify::{should_notify, Notifier, SlackNotifier};
pub use options::{Options, APPLY_SKIP_FILE, DEFAULT_DISPATCH_WIDTH, SECRET_BLOCKER_FILE};
pub use pipeline::{ApplyResult, ApplyTask, NamespaceApplyPipeline, PipelineContext};
pub use policy::{apply_skip_exists, may_apply, secret_blocker_exists, GateDecision};
pub use redact::{redact_env, redact_values};
pub use scm::{ChangedFile, GithubClient, SourceControlClient};
pub use session::ApplySession;
pub use telemetry::init_tracing;

/// nsapply version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
