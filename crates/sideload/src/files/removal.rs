//! Subtree inspection and best-effort removal of emptied directories.
//!
//! After every file of an imported directory has been deleted, what remains
//! is usually a shell of empty sub-directories. These helpers decide whether
//! such a directory may be removed and remove it.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use super::access;

/// What a walk of a directory found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SubtreeSummary {
    /// At least one regular file.
    has_file: bool,
    /// At least one entry that is neither a directory nor a regular file.
    has_other: bool,
    fully_accessible: bool,
}

/// Walk the subtree below `dir`.
///
/// Stops at the first entry that is not accessible, or, when `stop_at_entry`
/// is set, at the first entry that is not a directory. Directories must be
/// readable, writable and executable; files must be readable and writable.
fn inspect_subtree(dir: &Path, stop_at_entry: bool) -> SubtreeSummary {
    let mut summary = SubtreeSummary {
        has_file: false,
        has_other: false,
        fully_accessible: true,
    };

    for entry in WalkDir::new(dir).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => {
                summary.fully_accessible = false;
                return summary;
            }
        };

        let path = entry.path();
        let file_type = entry.file_type();
        if file_type.is_dir() {
            if !access::is_fully_accessible(path) {
                summary.fully_accessible = false;
                return summary;
            }
            continue;
        }

        if file_type.is_file() {
            summary.has_file = true;
        } else {
            summary.has_other = true;
        }
        if stop_at_entry {
            return summary;
        }
        if file_type.is_file() && !(access::is_readable(path) && access::is_writable(path)) {
            summary.fully_accessible = false;
            return summary;
        }
    }

    summary
}

/// True when the subtree holds nothing but directories, each of them
/// readable, writable and executable.
///
/// Symlinks and special files count as content: they would be left behind.
pub fn dir_has_no_file_and_is_removable(dir: &Path) -> bool {
    let summary = inspect_subtree(dir, true);
    !summary.has_file && !summary.has_other && summary.fully_accessible
}

/// True when the subtree holds at least one regular file and all of it
/// could be deleted later.
///
/// This is stricter than the per-entry check of the verifier, which only
/// looks at the immediate containing directory.
pub fn dir_has_files_and_is_removable(dir: &Path) -> bool {
    let summary = inspect_subtree(dir, false);
    summary.has_file && summary.fully_accessible
}

/// Remove a directory and everything below it, best effort.
///
/// Does nothing unless `dir` is an existing, readable and writable
/// directory. Children are removed depth-first; failures to remove a child
/// are ignored. Symlinks are unlinked, never followed. Returns whether the
/// directory itself was removed.
pub fn remove_dir_recursive(dir: &Path) -> bool {
    let is_real_dir = fs::symlink_metadata(dir)
        .map(|m| m.file_type().is_dir())
        .unwrap_or(false);
    if !is_real_dir || !access::is_readable(dir) || !access::is_writable(dir) {
        return false;
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return false,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            remove_dir_recursive(&path);
        } else if let Err(e) = fs::remove_file(&path) {
            tracing::debug!("Could not remove {:?}: {}", path, e);
        }
    }

    match fs::remove_dir(dir) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Could not remove directory {:?}: {}", dir, e);
            false
        }
    }
}
