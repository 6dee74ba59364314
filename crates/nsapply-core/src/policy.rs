//! Per-namespace skip/blocker policy gate.
//!
//! Sentinel files are presence-only: their content carries no meaning. The
//! gate is re-evaluated on every apply attempt rather than cached, since
//! operators can add or remove markers while a long batch is running.

use std::path::Path;

use crate::options::{APPLY_SKIP_FILE, SECRET_BLOCKER_FILE};

/// Outcome of the policy gate for one namespace directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Apply may proceed.
    Proceed,

    /// Namespace directory no longer exists on disk; it may have been deleted
    /// upstream since the batch started. Soft skip.
    SkipMissing,

    /// A sentinel marker blocks the apply. Soft skip.
    SkipBlocked,
}

/// Whether the namespace carries a secret-rotation blocker marker.
pub fn secret_blocker_exists(ns_dir: &Path) -> bool {
    ns_dir.join(SECRET_BLOCKER_FILE).exists()
}

/// Whether the namespace carries an operator apply-skip marker.
pub fn apply_skip_exists(ns_dir: &Path) -> bool {
    ns_dir.join(APPLY_SKIP_FILE).exists()
}

/// Decide whether a namespace may be applied.
///
/// The secret-rotation blocker is honored unconditionally: credential
/// rotation safety is not configurable. The apply-skip marker is honored
/// only when `skip_enabled`.
pub fn may_apply(ns_dir: &Path, skip_enabled: bool) -> GateDecision {
    if !ns_dir.exists() {
        return GateDecision::SkipMissing;
    }

    if secret_blocker_exists(ns_dir) {
        return GateDecision::SkipBlocked;
    }

    if skip_enabled && apply_skip_exists(ns_dir) {
        return GateDecision::SkipBlocked;
    }

    GateDecision::Proceed
}
