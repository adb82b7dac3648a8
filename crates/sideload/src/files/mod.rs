//! Filesystem safety layer for sideloading.
//!
//! This module provides:
//! - Root directory resolution and the settings shared by every check
//! - Path verification against the root (containment, permissions, type)
//! - Bounded, naturally sorted listings of files and sub-directories
//! - Removal of directories emptied by an import
//!
//! # Security
//!
//! Candidates are canonicalised before they are compared with the canonical
//! root, so `..` segments and symlinks pointing outside the root are
//! rejected. Listings only ever expose paths relative to the root.

pub mod access;
pub mod natural;
pub mod removal;
pub mod scanner;
pub mod settings;
pub mod verifier;
pub mod walk;

pub use removal::{dir_has_files_and_is_removable, dir_has_no_file_and_is_removable};
pub use scanner::{DirectoryScanner, ScanResult};
pub use settings::{ScanLimits, SideloadSettings};
pub use verifier::{is_illegal_candidate, EntryKind, PathVerifier, Rejection};
