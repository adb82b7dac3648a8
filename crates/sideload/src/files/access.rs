//! Effective-permission checks for the current process.
//!
//! These answer the same questions `access(2)` does: can this process read,
//! write or traverse the entry right now. Mode bits alone are not enough
//! because ownership, groups and ACLs all take part in the decision.

use std::path::Path;

use nix::unistd::{access, AccessFlags};

/// Check whether the process can read the entry.
pub fn is_readable(path: &Path) -> bool {
    access(path, AccessFlags::R_OK).is_ok()
}

/// Check whether the process can write to the entry.
pub fn is_writable(path: &Path) -> bool {
    access(path, AccessFlags::W_OK).is_ok()
}

/// Check whether the process can execute the entry (search it, for a directory).
pub fn is_executable(path: &Path) -> bool {
    access(path, AccessFlags::X_OK).is_ok()
}

/// A directory that can be listed and entered.
pub fn is_traversable(path: &Path) -> bool {
    access(path, AccessFlags::R_OK | AccessFlags::X_OK).is_ok()
}

/// Readable, writable and executable at once.
pub fn is_fully_accessible(path: &Path) -> bool {
    access(path, AccessFlags::R_OK | AccessFlags::W_OK | AccessFlags::X_OK).is_ok()
}

/// Whether mode bits are enforced for this process.
///
/// The superuser passes every read/write check regardless of mode, so
/// permission-dependent behaviour can only be observed as a regular user.
pub fn permissions_enforced() -> bool {
    !nix::unistd::geteuid().is_root()
}
