//! Changed-namespace resolution from a merged change request.

use std::path::Path;

use crate::error::{ApplyError, Result};
use crate::options::APPLY_SKIP_FILE;
use crate::scm::ChangedFile;

/// Unique, first-seen-ordered set of namespaces touched by a merged change
/// request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Namespace directory names directly under the cluster root.
    pub namespaces: Vec<String>,

    /// True when the change request consisted of exactly one file and that
    /// file is the apply-skip sentinel. Consumed later to suppress failure
    /// notifications for operator-initiated skips.
    pub only_skip_file_changed: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

/// Derive the set of namespace directories touched by `changed_files`.
///
/// `root` is the cluster namespace root as it appears in changed-file paths,
/// e.g. `namespaces/live.example`. The namespace is the path segment directly
/// under `root`; duplicates are collapsed preserving first-seen order. Files
/// sitting directly under `root` (no tenant directory segment) map to no
/// namespace and are ignored. An empty change list yields an empty set. A
/// path outside `root` is an input error.
pub fn resolve_changed_namespaces(changed_files: &[ChangedFile], root: &str) -> Result<ChangeSet> {
    let root = root.trim_end_matches('/');
    let mut namespaces: Vec<String> = Vec::new();

    for file in changed_files {
        let rest = file
            .path
            .strip_prefix(root)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| {
                ApplyError::InvalidInput(format!(
                    "changed file {} is outside the namespace root {}",
                    file.path, root
                ))
            })?;

        let mut segments = rest.split('/');
        let first = segments.next().unwrap_or_default();
        if segments.next().is_none() {
            // A file directly under the root, not inside a tenant directory.
            continue;
        }
        if !first.is_empty() && !namespaces.iter().any(|ns| ns == first) {
            namespaces.push(first.to_string());
        }
    }

    let only_skip_file_changed = changed_files.len() == 1
        && Path::new(&changed_files[0].path)
            .file_name()
            .is_some_and(|name| name == APPLY_SKIP_FILE);

    Ok(ChangeSet {
        namespaces,
        only_skip_file_changed,
    })
}
