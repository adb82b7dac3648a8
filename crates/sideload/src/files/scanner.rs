//! Bounded, deterministic listing of sideload candidates.
//!
//! The scanner walks a directory under the root, passes every entry through
//! the [`PathVerifier`] and returns paths relative to the root. Listings are
//! recomputed on each call and capped so that a huge or hostile tree cannot
//! make a request unbounded.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::natural::natural_cmp;
use super::removal::{
    dir_has_files_and_is_removable, dir_has_no_file_and_is_removable, remove_dir_recursive,
};
use super::settings::{ScanLimits, SideloadSettings};
use super::verifier::{EntryKind, PathVerifier};
use super::walk::traversable_entries;

/// Paths found by a listing, relative to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Relative paths, sorted.
    pub paths: Vec<String>,
    /// The cap was reached and more entries exist.
    pub more_available: bool,
}

impl ScanResult {
    /// Number of listed paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether nothing was listed.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Accepts unique entries up to a cap and remembers whether it overflowed.
struct BoundedCollector {
    cap: usize,
    seen: HashSet<PathBuf>,
    entries: Vec<(bool, String)>,
    more_available: bool,
}

impl BoundedCollector {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            seen: HashSet::new(),
            entries: Vec::new(),
            more_available: false,
        }
    }

    /// Offer an entry. Returns `false` once the walk should stop.
    fn offer(&mut self, canonical: PathBuf, leading: bool, relative: String) -> bool {
        if self.seen.contains(&canonical) {
            return true;
        }
        if self.cap != 0 && self.entries.len() >= self.cap {
            self.more_available = true;
            return false;
        }
        self.seen.insert(canonical);
        self.entries.push((leading, relative));
        true
    }

    /// Leading entries first, each group in natural order.
    fn finish(mut self) -> ScanResult {
        self.entries
            .sort_by(|(a_lead, a), (b_lead, b)| b_lead.cmp(a_lead).then_with(|| natural_cmp(a, b)));
        ScanResult {
            paths: self.entries.into_iter().map(|(_, path)| path).collect(),
            more_available: self.more_available,
        }
    }
}

/// Lists files and sub-directories under the root.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    verifier: PathVerifier,
    limits: ScanLimits,
}

impl DirectoryScanner {
    /// Create a scanner for the given settings.
    pub fn new(settings: &SideloadSettings) -> Self {
        Self {
            verifier: PathVerifier::new(settings),
            limits: settings.limits(),
        }
    }

    /// The verifier used to gate every entry.
    pub fn verifier(&self) -> &PathVerifier {
        &self.verifier
    }

    /// Configured caps.
    pub fn limits(&self) -> ScanLimits {
        self.limits
    }

    /// Canonical form of a directory that may be listed: the root itself or
    /// a verified directory under it.
    fn listing_base(&self, directory: &Path) -> Option<PathBuf> {
        let root = self.verifier.root()?;
        let canonical = fs::canonicalize(directory).ok()?;
        if canonical == root {
            return Some(canonical);
        }
        self.verifier.verify(&canonical, EntryKind::Directory)
    }

    /// List the files of `directory`.
    ///
    /// Without `recursive` only the immediate children are listed. Files
    /// directly in `directory` come first, then files of sub-directories,
    /// each group in case-insensitive natural order. `max_files` overrides
    /// the configured cap; zero means unbounded.
    pub fn list_files(
        &self,
        directory: &Path,
        recursive: bool,
        max_files: Option<usize>,
    ) -> ScanResult {
        let Some(base) = self.listing_base(directory) else {
            tracing::debug!("Not listing files of {:?}: invalid directory", directory);
            return ScanResult::default();
        };

        let mut collector = BoundedCollector::new(max_files.unwrap_or(self.limits.max_files));

        // Immediate children first so a cap keeps the top-level files.
        let immediate = traversable_entries(&base, 1, Some(1));
        let nested = recursive
            .then(|| traversable_entries(&base, 2, None))
            .into_iter()
            .flatten();

        for entry in immediate.chain(nested) {
            if entry.file_type().is_dir() {
                continue;
            }
            let Some(canonical) = self.verifier.verify_in(entry.path(), EntryKind::File, &base)
            else {
                continue;
            };
            let Some(relative) = self.verifier.relative_path(&canonical) else {
                continue;
            };
            let is_top_level = canonical.parent() == Some(base.as_path());
            if !collector.offer(canonical, is_top_level, relative) {
                break;
            }
        }

        collector.finish()
    }

    /// List the sub-directories of `directory` that are worth importing.
    ///
    /// A directory is listed when it passes the verifier and its subtree
    /// holds at least one file and could be deleted in full afterwards.
    /// `max_depth` of `Some(0)` looks at the immediate children only, `None`
    /// walks the whole subtree. `max_dirs` overrides the configured cap;
    /// zero means unbounded.
    pub fn list_dirs(
        &self,
        directory: &Path,
        max_depth: Option<usize>,
        max_dirs: Option<usize>,
    ) -> ScanResult {
        let Some(base) = self.listing_base(directory) else {
            tracing::debug!("Not listing directories of {:?}: invalid directory", directory);
            return ScanResult::default();
        };

        let mut collector =
            BoundedCollector::new(max_dirs.unwrap_or(self.limits.max_directories));

        for entry in traversable_entries(&base, 1, max_depth.map(|d| d.saturating_add(1))) {
            let is_dir = entry.file_type().is_dir()
                || (entry.path_is_symlink() && entry.path().is_dir());
            if !is_dir {
                continue;
            }
            let Some(canonical) =
                self.verifier.verify_in(entry.path(), EntryKind::Directory, &base)
            else {
                continue;
            };
            if !dir_has_files_and_is_removable(&canonical) {
                continue;
            }
            let Some(relative) = self.verifier.relative_path(&canonical) else {
                continue;
            };
            if !collector.offer(canonical, false, relative) {
                break;
            }
        }

        collector.finish()
    }

    /// Remove a directory under the root once nothing but empty
    /// sub-directories is left in it.
    ///
    /// Returns whether the directory was removed. Failure is not an error:
    /// the import that emptied it already succeeded.
    pub fn remove_if_empty_and_removable(&self, dir: &Path) -> bool {
        let canonical = match self.verifier.check(dir, EntryKind::Directory) {
            Ok(p) => p,
            Err(rejection) => {
                tracing::debug!("Not removing {:?}: {}", dir, rejection);
                return false;
            }
        };

        if !dir_has_no_file_and_is_removable(&canonical) {
            tracing::debug!("Not removing {:?}: not empty or not removable", canonical);
            return false;
        }

        let removed = remove_dir_recursive(&canonical);
        if removed {
            tracing::info!("Removed emptied sideload directory {:?}", canonical);
        } else {
            tracing::warn!("Failed to remove emptied sideload directory {:?}", canonical);
        }
        removed
    }
}
