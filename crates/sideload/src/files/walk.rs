//! Lazy directory walking with permission pruning.

use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use super::access;
use super::natural::natural_cmp;

/// Walk the entries below `dir`, yielding them lazily in natural order.
///
/// Depth 1 is the immediate children of `dir`; `max_depth` of `None` walks
/// the whole subtree. Directories that cannot be listed and entered are
/// pruned along with everything below them, and entries that fail to load
/// are skipped. Directory symlinks are reported but never descended into.
pub fn traversable_entries(
    dir: &Path,
    min_depth: usize,
    max_depth: Option<usize>,
) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(dir)
        .min_depth(min_depth)
        .max_depth(max_depth.unwrap_or(usize::MAX))
        .follow_links(false)
        .sort_by(|a, b| {
            natural_cmp(
                &a.file_name().to_string_lossy(),
                &b.file_name().to_string_lossy(),
            )
        })
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_type().is_dir() || access::is_traversable(entry.path())
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {}", e);
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn relative(dir: &Path, entries: impl Iterator<Item = DirEntry>) -> Vec<PathBuf> {
        entries
            .map(|e| e.path().strip_prefix(dir).unwrap().to_path_buf())
            .collect()
    }

    #[test]
    fn test_walk_in_natural_order() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("file10"), "").unwrap();
        fs::write(temp_dir.path().join("file2"), "").unwrap();
        fs::create_dir(temp_dir.path().join("Dir")).unwrap();
        fs::write(temp_dir.path().join("Dir/inner"), "").unwrap();

        let walked = relative(temp_dir.path(), traversable_entries(temp_dir.path(), 1, None));
        assert_eq!(
            walked,
            vec![
                PathBuf::from("Dir"),
                PathBuf::from("Dir/inner"),
                PathBuf::from("file2"),
                PathBuf::from("file10"),
            ]
        );
    }

    #[test]
    fn test_walk_depth_bounds() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("a/b/c")).unwrap();

        let shallow = relative(temp_dir.path(), traversable_entries(temp_dir.path(), 1, Some(1)));
        assert_eq!(shallow, vec![PathBuf::from("a")]);

        let nested = relative(temp_dir.path(), traversable_entries(temp_dir.path(), 2, None));
        assert_eq!(nested, vec![PathBuf::from("a/b"), PathBuf::from("a/b/c")]);
    }

    #[test]
    fn test_walk_prunes_closed_directories() {
        if !access::permissions_enforced() {
            eprintln!("skipped: running as root, permission bits are not enforced");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let closed = temp_dir.path().join("closed");
        fs::create_dir(&closed).unwrap();
        fs::write(closed.join("hidden.txt"), "").unwrap();
        fs::write(temp_dir.path().join("open.txt"), "").unwrap();
        fs::set_permissions(&closed, fs::Permissions::from_mode(0o000)).unwrap();

        let walked = relative(temp_dir.path(), traversable_entries(temp_dir.path(), 1, None));
        assert_eq!(walked, vec![PathBuf::from("open.txt")]);

        fs::set_permissions(&closed, fs::Permissions::from_mode(0o755)).unwrap();
    }
}
