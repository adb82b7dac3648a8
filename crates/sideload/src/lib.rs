//! # File Sideload Library
//!
//! This crate lets a host application import files that an administrator
//! placed in a server-side drop folder, without exposing anything outside
//! that folder.
//!
//! ## Overview
//!
//! - **Path Verification**: Every candidate is canonicalised and must stay
//!   inside the configured root, with the permissions the operation needs
//! - **Bounded Listings**: Files and importable directories are listed in
//!   natural order, capped, with a flag telling whether more exist
//! - **Ingest Orchestration**: Single-file and directory requests are checked
//!   and expanded into per-file imports
//! - **Cleanup**: In deletion mode, imported files are unlinked and emptied
//!   directories removed
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                    Sideloader                      │
//! ├────────────────────────────────────────────────────┤
//! │  ┌──────────────────┐   ┌───────────────────────┐  │
//! │  │ DirectoryScanner │──▶│     PathVerifier      │  │
//! │  └──────────────────┘   └───────────────────────┘  │
//! │  ┌──────────────────────────────────────────────┐  │
//! │  │              SideloadSettings                │  │
//! │  └──────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sideload::{Config, SideloadSettings, SideloadSource, Sideloader};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let settings = SideloadSettings::from_config(&config.sideload);
//!     let loader = Sideloader::new(&settings);
//!
//!     let plan = loader.plan(&SideloadSource::Directory {
//!         directory: "batch".to_string(),
//!         recursive: true,
//!     })?;
//!     for import in &plan.imports {
//!         // Store the file, then:
//!         loader.finish_import(&import.path, plan.directory.as_deref());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`files`]: Path verification, listings and removal
//! - [`ingest`]: Import requests and cleanup

pub mod config;
pub mod files;
pub mod ingest;

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export files types for convenience
pub use files::{
    DirectoryScanner, EntryKind, PathVerifier, Rejection, ScanLimits, ScanResult,
    SideloadSettings,
};

// Re-export ingest types for convenience
pub use ingest::{
    CleanupReport, FileOption, FileOptions, ImportPlan, IngestError, PlannedImport, SideloadSource,
    Sideloader,
};
