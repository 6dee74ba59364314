//! Local checkout refresh.
//!
//! The cluster repository checkout is shared, mutable and process-wide.
//! Every worker refreshes it before applying a namespace so a long batch
//! still sees skip/blocker markers merged after the run started. Sibling
//! workers can collide on git's `index.lock`; that contention is transient
//! and reported as [`ApplyError::GitLocked`] so callers can tolerate it.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{ApplyError, Result};

/// Pull the latest changes into the checkout at `repo_dir`.
pub async fn pull_latest(repo_dir: &Path) -> Result<()> {
    let output = Command::new("git")
        .args(["pull", "--ff-only"])
        .current_dir(repo_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ApplyError::Git(format!("failed to run git: {e}")))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if stderr.contains("index.lock") {
        return Err(ApplyError::GitLocked(stderr.trim().to_string()));
    }

    Err(ApplyError::Git(format!(
        "git pull failed: {}",
        stderr.trim()
    )))
}
