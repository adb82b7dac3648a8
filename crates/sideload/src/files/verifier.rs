//! Containment and permission checks for sideload candidates.
//!
//! Every candidate is canonicalised (symlinks resolved, `.` and `..`
//! normalised) before it is compared with the canonical root, so neither
//! `..` segments nor symlinks pointing elsewhere can escape the root. The
//! checks run as a single reject chain, cheapest first:
//!
//! 1. a root directory must be configured;
//! 2. the candidate must resolve;
//! 3. it must not be the base directory itself;
//! 4. it must lie under the base directory;
//! 5. in deletion mode its containing directory must be writable;
//! 6. it must be readable;
//! 7. it must be a traversable directory or a regular file, as requested.

use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use super::access;
use super::settings::SideloadSettings;

/// What kind of entry a caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A readable, traversable directory.
    Directory,
}

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// No usable root directory is configured.
    #[error("sideload directory is not configured")]
    RootUnset,

    /// The candidate does not exist or cannot be resolved.
    #[error("path cannot be resolved: {0}")]
    Unresolvable(PathBuf),

    /// The candidate is the base directory itself.
    #[error("path is the base directory: {0}")]
    IsBaseDirectory(PathBuf),

    /// The candidate resolves outside the base directory.
    #[error("path is outside the base directory: {0}")]
    OutsideBase(PathBuf),

    /// Deletion mode is on and the containing directory is not writable.
    #[error("containing directory is not writable but deletion is required: {0}")]
    ContainerNotWritable(PathBuf),

    /// The entry cannot be read.
    #[error("path is not readable: {0}")]
    NotReadable(PathBuf),

    /// A directory was expected.
    #[error("path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The directory cannot be entered.
    #[error("directory is not executable: {0}")]
    NotTraversable(PathBuf),

    /// A regular file was expected.
    #[error("path is not a regular file: {0}")]
    NotAFile(PathBuf),
}

/// Decides whether a candidate is a legitimate entry under the root.
#[derive(Debug, Clone)]
pub struct PathVerifier {
    root: Option<PathBuf>,
    delete_file: bool,
}

impl PathVerifier {
    /// Create a verifier for the given settings.
    pub fn new(settings: &SideloadSettings) -> Self {
        Self {
            root: settings.root().map(Path::to_path_buf),
            delete_file: settings.delete_file(),
        }
    }

    /// Canonical root directory, if configured.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Whether deletion mode is on.
    pub fn delete_file(&self) -> bool {
        self.delete_file
    }

    /// Turn a caller-supplied candidate into a filesystem path.
    ///
    /// A candidate that already starts with the root is used as is; anything
    /// else is taken relative to the root, including absolute paths outside
    /// it. Returns `None` when no root is configured.
    pub fn resolve_candidate(&self, candidate: &str) -> Option<PathBuf> {
        let root = self.root.as_deref()?;
        let path = Path::new(candidate);
        if path.starts_with(root) {
            return Some(path.to_path_buf());
        }
        let relative: PathBuf = path
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        Some(root.join(relative))
    }

    /// Verify a candidate against the root.
    ///
    /// Returns the canonical path, or `None` when any check fails.
    pub fn verify(&self, candidate: &Path, kind: EntryKind) -> Option<PathBuf> {
        self.check(candidate, kind).ok()
    }

    /// Verify a candidate against an explicit base directory under the root.
    pub fn verify_in(&self, candidate: &Path, kind: EntryKind, base: &Path) -> Option<PathBuf> {
        self.check_in(candidate, kind, base).ok()
    }

    /// Like [`verify`](Self::verify) but reports the reason for a rejection.
    pub fn check(&self, candidate: &Path, kind: EntryKind) -> Result<PathBuf, Rejection> {
        let root = self.root.as_deref().ok_or(Rejection::RootUnset)?;
        self.check_against(candidate, kind, root)
    }

    /// Like [`verify_in`](Self::verify_in) but reports the reason for a rejection.
    ///
    /// `base` must be canonical. A root must still be configured.
    pub fn check_in(
        &self,
        candidate: &Path,
        kind: EntryKind,
        base: &Path,
    ) -> Result<PathBuf, Rejection> {
        if self.root.is_none() {
            return Err(Rejection::RootUnset);
        }
        self.check_against(candidate, kind, base)
    }

    fn check_against(
        &self,
        candidate: &Path,
        kind: EntryKind,
        base: &Path,
    ) -> Result<PathBuf, Rejection> {
        let canonical = fs::canonicalize(candidate)
            .map_err(|_| Rejection::Unresolvable(candidate.to_path_buf()))?;

        if canonical == base {
            return Err(Rejection::IsBaseDirectory(canonical));
        }

        // Component-wise, so "/srv/drop2" is not under "/srv/drop".
        if !canonical.starts_with(base) {
            return Err(Rejection::OutsideBase(canonical));
        }

        if self.delete_file {
            let writable = canonical.parent().is_some_and(access::is_writable);
            if !writable {
                return Err(Rejection::ContainerNotWritable(canonical));
            }
        }

        if !access::is_readable(&canonical) {
            return Err(Rejection::NotReadable(canonical));
        }

        let metadata =
            fs::metadata(&canonical).map_err(|_| Rejection::Unresolvable(canonical.clone()))?;

        match kind {
            EntryKind::Directory => {
                if !metadata.is_dir() {
                    return Err(Rejection::NotADirectory(canonical));
                }
                if !access::is_executable(&canonical) {
                    return Err(Rejection::NotTraversable(canonical));
                }
            }
            EntryKind::File => {
                if !metadata.is_file() {
                    return Err(Rejection::NotAFile(canonical));
                }
            }
        }

        Ok(canonical)
    }

    /// Strip the root from a canonical path for display.
    ///
    /// Returns `None` for the root itself and for paths outside it.
    pub fn relative_path(&self, canonical: &Path) -> Option<String> {
        let root = self.root.as_deref()?;
        let relative = canonical.strip_prefix(root).ok()?;
        if relative.as_os_str().is_empty() {
            return None;
        }
        Some(relative.to_string_lossy().into_owned())
    }
}

/// Candidates refused before touching the filesystem.
///
/// `.`, `..` and `/` would resolve to the root or its parent, and any `..`
/// segment is a traversal attempt regardless of where it ends up.
pub fn is_illegal_candidate(candidate: &str) -> bool {
    matches!(candidate, "." | ".." | "/")
        || Path::new(candidate)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
}
