//! Domain-level error taxonomy for nsapply.

use std::path::PathBuf;

/// Errors produced by namespace resolution and apply orchestration.
///
/// Soft conditions (namespace directory missing, policy-gated skips) are not
/// errors: they are [`crate::policy::GateDecision`]s that get logged and
/// folded into successful results.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("batch index {index} with size {size} is out of range for {total} namespaces")]
    OutOfRange {
        index: usize,
        size: usize,
        total: usize,
    },

    #[error("external tool failed for namespace {namespace}: {detail}")]
    ExternalTool { namespace: String, detail: String },

    #[error("directory {dir} and namespace {namespace} are not aligned")]
    Consistency { dir: PathBuf, namespace: String },

    #[error("checkout is locked by a sibling worker: {0}")]
    GitLocked(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("source control error: {0}")]
    Scm(String),

    #[error("notification error: {0}")]
    Notify(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for nsapply domain operations.
pub type Result<T> = std::result::Result<T, ApplyError>;
