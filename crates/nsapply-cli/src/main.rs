//! nsapply - GitOps namespace batch apply CLI
//!
//! Applies tenant namespace changes across a multi-tenant cluster
//! repository.
//!
//! ## Commands
//!
//! - `apply`: apply one namespace, or every namespace touched by a merged PR
//! - `apply-all`: apply every namespace in the cluster directory
//! - `apply-batch`: apply one deterministic slice of the namespace listing
//! - `delete`: delete one namespace's resources

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use nsapply_core::{
    ApplyResult, ApplySession, GithubClient, Options, ShellApplier, SlackNotifier,
    DEFAULT_DISPATCH_WIDTH,
};

#[derive(Parser)]
#[command(name = "nsapply")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "GitOps namespace batch apply", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SessionArgs {
    /// Cluster directory under namespaces/
    #[arg(long, env = "NSAPPLY_CLUSTER_DIR")]
    cluster_dir: String,

    /// Kube access config handed to every infra apply
    #[arg(long, env = "KUBE_CONFIG_PATH", default_value = "/tmp/kubeconfig")]
    kubecfg_path: PathBuf,

    /// Root of the cluster repository checkout
    #[arg(long, default_value = ".")]
    repo_root: PathBuf,

    /// Merged change-request number (0: none)
    #[arg(long, env = "NSAPPLY_PR_NUMBER", default_value_t = 0)]
    pr_number: u64,

    /// CI build URL included in failure notifications
    #[arg(long, env = "NSAPPLY_BUILD_URL", default_value = "")]
    build_url: String,

    /// Honor per-namespace apply-skip sentinel files
    #[arg(long)]
    enable_apply_skip: bool,

    /// Redact sensitive env values from infra tool output
    #[arg(long)]
    redact_output: bool,

    /// Unattended pipeline mode: caps runtime threads, suppresses notifications
    #[arg(long)]
    apply_pipeline: bool,

    /// Concurrent apply workers
    #[arg(long, default_value_t = DEFAULT_DISPATCH_WIDTH)]
    width: usize,

    /// GitHub repository (owner/name) holding the cluster config
    #[arg(long, env = "GITHUB_REPO", default_value = "")]
    github_repo: String,

    /// GitHub token with read access to the repository
    #[arg(long, env = "GITHUB_TOKEN", default_value = "", hide_env_values = true)]
    github_token: String,

    /// Slack webhook for failure notifications
    #[arg(long, env = "SLACK_WEBHOOK_URL", default_value = "")]
    slack_webhook_url: String,

    /// Slack bot token
    #[arg(long, env = "SLACK_BOT_TOKEN", default_value = "", hide_env_values = true)]
    slack_token: String,

    /// Terraform binary
    #[arg(long, default_value = "/usr/local/bin/terraform")]
    terraform_bin: PathBuf,

    /// Kubectl binary
    #[arg(long, default_value = "/usr/local/bin/kubectl")]
    kubectl_bin: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply one namespace, or every namespace changed in a merged PR
    Apply {
        /// Namespace to apply; omit to resolve from --pr-number
        #[arg(long)]
        namespace: Option<String>,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Apply every namespace in the cluster directory
    ApplyAll {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Apply one deterministic batch slice of the namespace listing
    ApplyBatch {
        /// Slice index
        #[arg(long)]
        batch_index: usize,

        /// Slice size
        #[arg(long)]
        batch_size: usize,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Delete one namespace's resources (infra destroy, then manifests)
    Delete {
        /// Namespace to delete
        #[arg(long)]
        namespace: String,

        #[command(flatten)]
        session: SessionArgs,
    },
}

impl Commands {
    fn session_args(&self) -> &SessionArgs {
        match self {
            Commands::Apply { session, .. }
            | Commands::ApplyAll { session }
            | Commands::ApplyBatch { session, .. }
            | Commands::Delete { session, .. } => session,
        }
    }
}

fn build_options(command: &Commands) -> Options {
    let args = command.session_args();
    let (namespace, batch_index, batch_size) = match command {
        Commands::Apply { namespace, .. } => (namespace.clone(), 0, 0),
        Commands::ApplyAll { .. } => (None, 0, 0),
        Commands::ApplyBatch {
            batch_index,
            batch_size,
            ..
        } => (None, *batch_index, *batch_size),
        Commands::Delete { namespace, .. } => (Some(namespace.clone()), 0, 0),
    };

    Options {
        namespace,
        cluster_dir: args.cluster_dir.clone(),
        kubecfg_path: args.kubecfg_path.clone(),
        pr_number: args.pr_number,
        build_url: args.build_url.clone(),
        enable_apply_skip: args.enable_apply_skip,
        redact_output: args.redact_output,
        batch_index,
        batch_size,
        is_apply_pipeline: args.apply_pipeline,
        dispatch_width: args.width.max(1),
    }
}

fn build_session(command: &Commands) -> ApplySession {
    let args = command.session_args();
    let options = build_options(command);

    let applier = Arc::new(ShellApplier::new(&args.terraform_bin, &args.kubectl_bin));
    let scm = Arc::new(GithubClient::new(&args.github_repo, &args.github_token));
    let notifier = Arc::new(SlackNotifier::new(
        &args.slack_webhook_url,
        &args.slack_token,
    ));

    ApplySession::new(options, &args.repo_root, applier, scm, notifier)
}

fn report(results: &[ApplyResult]) {
    for result in results {
        let status = if result.succeeded { "ok" } else { "failed" };
        println!("{:<8} {:<40} {}", status, result.namespace, result.message);
    }

    let errored: Vec<&str> = results
        .iter()
        .filter(|r| !r.succeeded)
        .map(|r| r.namespace.as_str())
        .collect();
    if !errored.is_empty() {
        println!("\nerrored namespaces: {errored:?}");
    }
}

async fn run(cli: Cli) -> Result<()> {
    let session = build_session(&cli.command);

    match &cli.command {
        Commands::Apply { .. } => {
            let results = session.apply().await.context("apply failed")?;
            report(&results);
        }
        Commands::ApplyAll { .. } => {
            let results = session.apply_all().await.context("apply-all failed")?;
            report(&results);
        }
        Commands::ApplyBatch { .. } => {
            let results = session.apply_batch().await.context("apply-batch failed")?;
            report(&results);
        }
        Commands::Delete { namespace, .. } => {
            let message = session
                .delete()
                .await
                .with_context(|| format!("delete of namespace {namespace} failed"))?;
            println!("{message}");
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    nsapply_core::init_tracing(cli.json, cli.verbose);

    let args = cli.command.session_args();
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if args.apply_pipeline {
        // The pipeline host's CPU budget is itself capped; keep the runtime's
        // scheduling threads down at the dispatch width.
        let width = args.width.max(1);
        info!(width, "unattended mode: capping runtime worker threads");
        builder.worker_threads(width);
    }
    let runtime = builder.build().context("building tokio runtime")?;

    runtime.block_on(run(cli))
}
