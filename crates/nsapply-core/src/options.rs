//! Invocation options for apply sessions.

use std::path::PathBuf;

/// Sentinel file forcing an unconditional skip while a namespace has its
/// secrets rotated.
pub const SECRET_BLOCKER_FILE: &str = "SECRET_ROTATE_BLOCK";

/// Sentinel file for an operator-requested skip, honored only when the skip
/// feature is enabled. The same name appearing as the sole changed file of a
/// merged PR marks an operator-initiated skip.
pub const APPLY_SKIP_FILE: &str = "APPLY_PIPELINE_SKIP_THIS_NAMESPACE";

/// Default number of concurrent per-namespace apply workers. Kept small on
/// purpose: each worker spawns external tools and holds per-namespace tool
/// state locks, so the workload is process/IO bound and the pipeline host has
/// a limited CPU budget.
pub const DEFAULT_DISPATCH_WIDTH: usize = 3;

/// Options configuring one apply/delete session. Normally populated from CLI
/// flags; immutable for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct Options {
    /// Single namespace to apply. When empty, `pr_number` drives resolution.
    pub namespace: Option<String>,

    /// Cluster directory under `namespaces/`, e.g. `live.cloud-platform.example`.
    pub cluster_dir: String,

    /// Kube access config handed to every infra apply call.
    pub kubecfg_path: PathBuf,

    /// Merged change-request number; 0 means none given.
    pub pr_number: u64,

    /// CI build URL included in failure notifications.
    pub build_url: String,

    /// Honor per-namespace apply-skip sentinel files.
    pub enable_apply_skip: bool,

    /// Pass infra tool output through the secret redaction filter.
    pub redact_output: bool,

    /// Batch slice index for sharded runs.
    pub batch_index: usize,

    /// Batch slice size for sharded runs.
    pub batch_size: usize,

    /// Running unattended inside the apply pipeline: caps runtime threads and
    /// suppresses failure notifications.
    pub is_apply_pipeline: bool,

    /// Number of concurrent apply workers.
    pub dispatch_width: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            namespace: None,
            cluster_dir: String::new(),
            kubecfg_path: PathBuf::new(),
            pr_number: 0,
            build_url: String::new(),
            enable_apply_skip: false,
            redact_output: false,
            batch_index: 0,
            batch_size: 0,
            is_apply_pipeline: false,
            dispatch_width: DEFAULT_DISPATCH_WIDTH,
        }
    }
}

impl Options {
    /// Root of the namespace tree for this cluster, relative to the checkout.
    pub fn namespace_root(&self) -> PathBuf {
        PathBuf::from("namespaces").join(&self.cluster_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_root_joins_cluster_dir() {
        let opts = Options {
            cluster_dir: "live.example".to_string(),
            ..Options::default()
        };
        assert_eq!(
            opts.namespace_root(),
            PathBuf::from("namespaces/live.example")
        );
    }

    #[test]
    fn test_default_width_is_three() {
        assert_eq!(Options::default().dispatch_width, 3);
    }
}
