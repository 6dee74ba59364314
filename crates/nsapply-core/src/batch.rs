//! Deterministic batch slicing of the namespace listing for sharded runs.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ApplyError, Result};

/// List the namespace directories under the cluster root, sorted by name.
///
/// The aggregate root itself is not part of the listing; only its immediate
/// sub-directories are units of work. Sorting makes chunk boundaries stable
/// across retries of the same batch.
pub fn list_namespace_dirs(repo_path: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(repo_path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Return the `index`-th contiguous chunk of `size` entries from `listing`.
///
/// Deterministic: identical `(listing, index, size)` always yields identical
/// boundaries. The final chunk may be shorter than `size`. `index * size`
/// beyond the listing is an `OutOfRange` error.
pub fn chunk(listing: &[PathBuf], index: usize, size: usize) -> Result<Vec<PathBuf>> {
    if size == 0 {
        return Err(ApplyError::InvalidInput(
            "batch size must be greater than zero".to_string(),
        ));
    }

    let start = index * size;
    if start >= listing.len() {
        return Err(ApplyError::OutOfRange {
            index,
            size,
            total: listing.len(),
        });
    }

    let end = (start + size).min(listing.len());
    Ok(listing[start..end].to_vec())
}

/// List the cluster's namespace directories and return the requested chunk.
pub fn folder_chunks(repo_path: &Path, index: usize, size: usize) -> Result<Vec<PathBuf>> {
    let listing = list_namespace_dirs(repo_path)?;
    chunk(&listing, index, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_chunk_boundaries() {
        let full = listing(&["a", "b", "c", "d", "e"]);
        assert_eq!(chunk(&full, 0, 2).unwrap(), listing(&["a", "b"]));
        assert_eq!(chunk(&full, 1, 2).unwrap(), listing(&["c", "d"]));
        // Final chunk may be short.
        assert_eq!(chunk(&full, 2, 2).unwrap(), listing(&["e"]));
    }

    #[test]
    fn test_chunk_out_of_range() {
        let full = listing(&["a", "b", "c"]);
        let err = chunk(&full, 2, 2).unwrap_err();
        assert!(matches!(
            err,
            ApplyError::OutOfRange {
                index: 2,
                size: 2,
                total: 3
            }
        ));
    }

    #[test]
    fn test_chunk_zero_size_rejected() {
        let full = listing(&["a"]);
        assert!(matches!(
            chunk(&full, 0, 0),
            Err(ApplyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_chunks_reconstruct_listing_without_overlap() {
        let full = listing(&["a", "b", "c", "d", "e", "f", "g"]);
        let size = 3;
        let mut rebuilt = Vec::new();
        let mut index = 0;
        while let Ok(part) = chunk(&full, index, size) {
            rebuilt.extend(part);
            index += 1;
        }
        assert_eq!(rebuilt, full);
    }

    #[test]
    fn test_list_namespace_dirs_sorted_dirs_only() {
        let root = tempfile::tempdir().unwrap();
        for name in ["zeta", "alpha", "mid"] {
            fs::create_dir(root.path().join(name)).unwrap();
        }
        fs::write(root.path().join("README.md"), "not a namespace").unwrap();

        let dirs = list_namespace_dirs(root.path()).unwrap();
        let names: Vec<_> = dirs
            .iter()
            .map(|d| d.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
