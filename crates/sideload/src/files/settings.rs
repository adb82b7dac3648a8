//! Resolved sideload settings.
//!
//! [`SideloadSettings`] is built once per request or process from the
//! persisted configuration and then handed by reference to the verifier and
//! the scanner. The root is canonicalised here, so every later containment
//! check compares symlink-free paths.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::access;
use crate::config::SideloadConfig;

/// Caps on enumeration. Zero means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScanLimits {
    /// Maximum number of files returned by a file listing.
    pub max_files: usize,
    /// Maximum number of directories returned by a directory listing.
    pub max_directories: usize,
}

/// Resolved configuration shared by [`PathVerifier`](super::PathVerifier)
/// and [`DirectoryScanner`](super::DirectoryScanner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideloadSettings {
    root: Option<PathBuf>,
    delete_file: bool,
    limits: ScanLimits,
}

impl SideloadSettings {
    /// Resolve the root directory and store the remaining options.
    ///
    /// The root is left unset when it is missing, cannot be resolved, is not
    /// a directory or cannot be listed and entered by this process. Every
    /// operation then returns an empty or rejected result.
    pub fn configure(
        root: Option<&Path>,
        delete_after_import: bool,
        max_files: usize,
        max_directories: usize,
    ) -> Self {
        Self {
            root: root.and_then(resolve_root),
            delete_file: delete_after_import,
            limits: ScanLimits {
                max_files,
                max_directories,
            },
        }
    }

    /// Build the settings from the `[sideload]` configuration section.
    pub fn from_config(config: &SideloadConfig) -> Self {
        Self::configure(
            config.directory.as_deref(),
            config.delete_file,
            config.max_files,
            config.max_directories,
        )
    }

    /// Canonical root directory, if it resolved.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Whether source files are removed after a successful import.
    pub fn delete_file(&self) -> bool {
        self.delete_file
    }

    /// Configured listing caps.
    pub fn limits(&self) -> ScanLimits {
        self.limits
    }

    /// Whether a usable root directory is configured.
    pub fn is_configured(&self) -> bool {
        self.root.is_some()
    }
}

fn resolve_root(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        return None;
    }

    let canonical = match fs::canonicalize(path) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Sideload directory {:?} cannot be resolved: {}", path, e);
            return None;
        }
    };

    if !canonical.is_dir() {
        tracing::warn!("Sideload directory {:?} is not a directory", canonical);
        return None;
    }

    if !access::is_traversable(&canonical) {
        tracing::warn!(
            "Sideload directory {:?} is not readable and executable",
            canonical
        );
        return None;
    }

    Some(canonical)
}
