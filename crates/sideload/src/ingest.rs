//! Ingest orchestration on top of the filesystem layer.
//!
//! A host application asks to import either one file or every file of a
//! directory from the drop folder. [`Sideloader`] validates the request,
//! expands it into an [`ImportPlan`], and once the host has stored the bytes
//! performs the deletion-mode cleanup.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::{
    access, is_illegal_candidate, DirectoryScanner, EntryKind, PathVerifier, Rejection,
    SideloadSettings,
};

/// What the host asked to import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideloadSource {
    /// One file, relative to the root or absolute under it.
    SingleFile { filename: String },
    /// Every file of a directory.
    Directory {
        directory: String,
        #[serde(default)]
        recursive: bool,
    },
}

/// Reasons an import request is refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("no ingest directory specified")]
    MissingDirectory,

    #[error("no ingest filename specified")]
    MissingFilename,

    #[error("illegal ingest directory specified: {0}")]
    IllegalDirectory(String),

    #[error("ingest directory {0:?} is not writable but deletion after import is required")]
    DirectoryNotWritable(PathBuf),

    #[error("invalid ingest directory {0:?}: not a directory")]
    NotADirectory(PathBuf),

    #[error("invalid ingest directory {0:?}: incorrect path or insufficient permissions")]
    InvalidDirectory(PathBuf),

    #[error("cannot sideload file {0:?}: file does not exist, is outside the sideload directory or has insufficient permissions")]
    InvalidFile(String),

    #[error("cannot sideload file {file:?}: ingestion of directory {directory:?} is not recursive")]
    NotRootFile { file: String, directory: PathBuf },
}

/// One file to import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedImport {
    /// Name recorded as the import source, relative to the root.
    pub source_name: String,
    /// Canonical path of the file.
    pub path: PathBuf,
}

/// The per-file imports a request expands to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportPlan {
    /// Canonical ingest directory for directory requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    pub imports: Vec<PlannedImport>,
    /// The file cap cut the expansion short.
    pub truncated: bool,
}

/// What the deletion-mode cleanup did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub source_removed: bool,
    pub directory_removed: bool,
}

/// One entry of the file picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOption {
    /// Path relative to the root, sent back with the request.
    pub value: String,
    /// Path relative to the user directory, shown to the user.
    pub label: String,
}

/// Entries of the file picker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileOptions {
    pub options: Vec<FileOption>,
    pub more_available: bool,
}

impl FileOptions {
    /// Prompt shown above the picker.
    pub fn placeholder(&self) -> &'static str {
        if self.options.is_empty() {
            "No file: add files in the directory or check its path"
        } else if self.more_available {
            "Select a file to sideload… (only first ones are listed)"
        } else {
            "Select a file to sideload…"
        }
    }
}

/// Validates import requests and cleans up after them.
#[derive(Debug, Clone)]
pub struct Sideloader {
    scanner: DirectoryScanner,
}

impl Sideloader {
    pub fn new(settings: &SideloadSettings) -> Self {
        Self {
            scanner: DirectoryScanner::new(settings),
        }
    }

    pub fn scanner(&self) -> &DirectoryScanner {
        &self.scanner
    }

    fn verifier(&self) -> &PathVerifier {
        self.scanner.verifier()
    }

    /// Resolve and verify the directory of a directory import.
    pub fn check_ingest_dir(&self, directory: &str) -> Result<PathBuf, IngestError> {
        if directory.is_empty() {
            return Err(IngestError::MissingDirectory);
        }
        if is_illegal_candidate(directory) {
            return Err(IngestError::IllegalDirectory(directory.to_string()));
        }

        let candidate = self
            .verifier()
            .resolve_candidate(directory)
            .ok_or_else(|| IngestError::InvalidDirectory(PathBuf::from(directory)))?;

        self.verifier()
            .check(&candidate, EntryKind::Directory)
            .map_err(|rejection| {
                tracing::debug!("Rejected ingest directory {:?}: {}", candidate, rejection);
                match rejection {
                    Rejection::ContainerNotWritable(_) => {
                        IngestError::DirectoryNotWritable(candidate.clone())
                    }
                    Rejection::NotADirectory(_) => IngestError::NotADirectory(candidate.clone()),
                    _ => IngestError::InvalidDirectory(candidate.clone()),
                }
            })
    }

    /// Resolve and verify the file of a single-file import.
    ///
    /// A `..` segment is refused even when it resolves inside the root.
    pub fn check_ingest_file(&self, filename: &str) -> Result<PathBuf, IngestError> {
        if filename.is_empty() {
            return Err(IngestError::MissingFilename);
        }
        if is_illegal_candidate(filename) {
            return Err(IngestError::InvalidFile(filename.to_string()));
        }

        let candidate = self
            .verifier()
            .resolve_candidate(filename)
            .ok_or_else(|| IngestError::InvalidFile(filename.to_string()))?;

        self.verifier()
            .check(&candidate, EntryKind::File)
            .map_err(|rejection| {
                tracing::debug!("Rejected ingest file {:?}: {}", candidate, rejection);
                IngestError::InvalidFile(filename.to_string())
            })
    }

    /// Verify a file that belongs to a directory import.
    ///
    /// `ingest_dir` must be canonical. Without `recursive` the file must sit
    /// directly in it.
    pub fn check_ingest_file_in_dir(
        &self,
        filename: &str,
        ingest_dir: &Path,
        recursive: bool,
    ) -> Result<PathBuf, IngestError> {
        let canonical = self.check_ingest_file(filename)?;
        if !recursive && canonical.parent() != Some(ingest_dir) {
            return Err(IngestError::NotRootFile {
                file: filename.to_string(),
                directory: ingest_dir.to_path_buf(),
            });
        }
        Ok(canonical)
    }

    /// Expand a request into the files to import.
    pub fn plan(&self, source: &SideloadSource) -> Result<ImportPlan, IngestError> {
        match source {
            SideloadSource::SingleFile { filename } => {
                let path = self.check_ingest_file(filename)?;
                let source_name = self
                    .verifier()
                    .relative_path(&path)
                    .unwrap_or_else(|| filename.clone());
                Ok(ImportPlan {
                    directory: None,
                    imports: vec![PlannedImport { source_name, path }],
                    truncated: false,
                })
            }
            SideloadSource::Directory {
                directory,
                recursive,
            } => {
                let ingest_dir = self.check_ingest_dir(directory)?;
                let listing = self.scanner.list_files(&ingest_dir, *recursive, None);

                let mut imports = Vec::with_capacity(listing.len());
                for relative in listing.paths {
                    match self.check_ingest_file_in_dir(&relative, &ingest_dir, *recursive) {
                        Ok(path) => imports.push(PlannedImport {
                            source_name: relative,
                            path,
                        }),
                        Err(e) => tracing::debug!("Dropping {} from plan: {}", relative, e),
                    }
                }

                tracing::debug!(
                    "Planned {} imports from {:?} (truncated: {})",
                    imports.len(),
                    ingest_dir,
                    listing.more_available
                );

                Ok(ImportPlan {
                    directory: Some(ingest_dir),
                    imports,
                    truncated: listing.more_available,
                })
            }
        }
    }

    /// Clean up after the host stored a file.
    ///
    /// Does nothing unless deletion after import is enabled. The file is
    /// verified again before it is unlinked, then `ingest_dir`, if given, is
    /// removed once nothing but empty directories is left in it.
    pub fn finish_import(&self, file: &Path, ingest_dir: Option<&Path>) -> CleanupReport {
        let mut report = CleanupReport::default();
        if !self.verifier().delete_file() {
            return report;
        }

        match self.verifier().check(file, EntryKind::File) {
            Ok(canonical) => match fs::remove_file(&canonical) {
                Ok(()) => {
                    tracing::info!("Deleted sideloaded file {:?}", canonical);
                    report.source_removed = true;
                }
                Err(e) => tracing::warn!("Failed to delete sideloaded file {:?}: {}", canonical, e),
            },
            Err(rejection) => {
                tracing::warn!("Not deleting {:?}: {}", file, rejection);
            }
        }

        if let Some(dir) = ingest_dir {
            report.directory_removed = self.scanner.remove_if_empty_and_removable(dir);
        }

        report
    }

    /// Default listing directory for a user.
    ///
    /// `sub` is a path relative to the root. Falls back to the root when it
    /// is empty or does not name a listable directory inside the root.
    /// Returns `None` when no root is configured.
    pub fn user_directory(&self, sub: &str) -> Option<PathBuf> {
        let root = self.verifier().root()?;
        if sub.is_empty() || is_illegal_candidate(sub) {
            return Some(root.to_path_buf());
        }

        let resolved = self
            .verifier()
            .resolve_candidate(sub)
            .and_then(|p| fs::canonicalize(p).ok())
            .filter(|p| p.starts_with(root) && p.is_dir() && access::is_traversable(p));

        match resolved {
            Some(dir) => Some(dir),
            None => {
                tracing::debug!("User directory {:?} is not usable, using the root", sub);
                Some(root.to_path_buf())
            }
        }
    }

    /// Files the user may pick, listed recursively from their directory.
    pub fn file_options(&self, user_dir: &str) -> FileOptions {
        let Some(dir) = self.user_directory(user_dir) else {
            return FileOptions::default();
        };

        let prefix = self.verifier().relative_path(&dir);
        let listing = self.scanner.list_files(&dir, true, None);

        let options = listing
            .paths
            .into_iter()
            .map(|value| {
                let label = prefix
                    .as_deref()
                    .and_then(|p| Path::new(&value).strip_prefix(p).ok())
                    .map(|rest| rest.to_string_lossy().into_owned())
                    .unwrap_or_else(|| value.clone());
                FileOption { value, label }
            })
            .collect();

        FileOptions {
            options,
            more_available: listing.more_available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn sideloader(dir: &Path, delete_file: bool, max_files: usize) -> Sideloader {
        Sideloader::new(&SideloadSettings::configure(
            Some(dir),
            delete_file,
            max_files,
            0,
        ))
    }

    fn create_drop_folder(dir: &Path) {
        fs::create_dir_all(dir.join("batch/nested")).unwrap();
        fs::write(dir.join("loose.txt"), "l").unwrap();
        fs::write(dir.join("batch/one.txt"), "1").unwrap();
        fs::write(dir.join("batch/two.txt"), "2").unwrap();
        fs::write(dir.join("batch/nested/three.txt"), "3").unwrap();
    }

    #[test]
    fn test_source_serialization() {
        let source: SideloadSource =
            serde_json::from_str(r#"{"type":"directory","directory":"batch"}"#).unwrap();
        assert_eq!(
            source,
            SideloadSource::Directory {
                directory: "batch".to_string(),
                recursive: false
            }
        );

        let json = serde_json::to_string(&SideloadSource::SingleFile {
            filename: "a.txt".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"single_file""#));
    }

    #[test]
    fn test_check_ingest_dir() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());
        let loader = sideloader(temp_dir.path(), false, 0);
        let root = fs::canonicalize(temp_dir.path()).unwrap();

        assert_eq!(loader.check_ingest_dir("batch"), Ok(root.join("batch")));
        let absolute = root.join("batch").to_string_lossy().into_owned();
        assert_eq!(loader.check_ingest_dir(&absolute), Ok(root.join("batch")));
    }

    #[test]
    fn test_check_ingest_dir_errors() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());
        let loader = sideloader(temp_dir.path(), false, 0);

        assert_eq!(loader.check_ingest_dir(""), Err(IngestError::MissingDirectory));
        for illegal in [".", "..", "/", "batch/../.."] {
            assert_eq!(
                loader.check_ingest_dir(illegal),
                Err(IngestError::IllegalDirectory(illegal.to_string()))
            );
        }
        assert!(matches!(
            loader.check_ingest_dir("loose.txt"),
            Err(IngestError::NotADirectory(_))
        ));
        assert!(matches!(
            loader.check_ingest_dir("missing"),
            Err(IngestError::InvalidDirectory(_))
        ));
    }

    #[test]
    fn test_check_ingest_dir_not_writable_in_deletion_mode() {
        if !access::permissions_enforced() {
            eprintln!("skipped: running as root, permission bits are not enforced");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let parent = temp_dir.path().join("readonly");
        fs::create_dir_all(parent.join("batch")).unwrap();
        fs::write(parent.join("batch/f.txt"), "f").unwrap();
        fs::set_permissions(&parent, fs::Permissions::from_mode(0o555)).unwrap();

        let loader = sideloader(temp_dir.path(), true, 0);
        assert!(matches!(
            loader.check_ingest_dir("readonly/batch"),
            Err(IngestError::DirectoryNotWritable(_))
        ));

        fs::set_permissions(&parent, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_check_ingest_file() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());
        let loader = sideloader(temp_dir.path(), false, 0);
        let root = fs::canonicalize(temp_dir.path()).unwrap();

        assert_eq!(loader.check_ingest_file("loose.txt"), Ok(root.join("loose.txt")));
        assert_eq!(loader.check_ingest_file(""), Err(IngestError::MissingFilename));
        assert_eq!(
            loader.check_ingest_file("../etc/passwd"),
            Err(IngestError::InvalidFile("../etc/passwd".to_string()))
        );
        assert!(loader.check_ingest_file("batch").is_err());
    }

    #[test]
    fn test_check_ingest_file_rejects_parent_segment_inside_root() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());
        let loader = sideloader(temp_dir.path(), false, 0);
        let root = fs::canonicalize(temp_dir.path()).unwrap();

        for candidate in ["batch/../loose.txt", "batch/nested/../one.txt", ".."] {
            assert_eq!(
                loader.check_ingest_file(candidate),
                Err(IngestError::InvalidFile(candidate.to_string()))
            );
        }
        let absolute = root.join("batch/../loose.txt").to_string_lossy().into_owned();
        assert!(loader.check_ingest_file(&absolute).is_err());

        assert_eq!(
            loader.plan(&SideloadSource::SingleFile {
                filename: "batch/../loose.txt".to_string(),
            }),
            Err(IngestError::InvalidFile("batch/../loose.txt".to_string()))
        );
    }

    #[test]
    fn test_check_ingest_file_in_dir() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());
        let loader = sideloader(temp_dir.path(), false, 0);
        let batch = loader.check_ingest_dir("batch").unwrap();

        assert!(loader
            .check_ingest_file_in_dir("batch/one.txt", &batch, false)
            .is_ok());
        assert_eq!(
            loader.check_ingest_file_in_dir("batch/nested/three.txt", &batch, false),
            Err(IngestError::NotRootFile {
                file: "batch/nested/three.txt".to_string(),
                directory: batch.clone(),
            })
        );
        assert!(loader
            .check_ingest_file_in_dir("batch/nested/three.txt", &batch, true)
            .is_ok());
    }

    #[test]
    fn test_plan_single_file() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());
        let loader = sideloader(temp_dir.path(), false, 0);

        let plan = loader
            .plan(&SideloadSource::SingleFile {
                filename: "batch/one.txt".to_string(),
            })
            .unwrap();
        assert_eq!(plan.imports.len(), 1);
        assert_eq!(plan.imports[0].source_name, "batch/one.txt");
        assert!(plan.directory.is_none());
        assert!(!plan.truncated);
    }

    #[test]
    fn test_plan_directory() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());
        let loader = sideloader(temp_dir.path(), false, 0);

        let flat = loader
            .plan(&SideloadSource::Directory {
                directory: "batch".to_string(),
                recursive: false,
            })
            .unwrap();
        let names: Vec<_> = flat.imports.iter().map(|i| i.source_name.as_str()).collect();
        assert_eq!(names, vec!["batch/one.txt", "batch/two.txt"]);

        let deep = loader
            .plan(&SideloadSource::Directory {
                directory: "batch".to_string(),
                recursive: true,
            })
            .unwrap();
        let names: Vec<_> = deep.imports.iter().map(|i| i.source_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["batch/one.txt", "batch/two.txt", "batch/nested/three.txt"]
        );
    }

    #[test]
    fn test_plan_directory_truncated() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());
        let loader = sideloader(temp_dir.path(), false, 1);

        let plan = loader
            .plan(&SideloadSource::Directory {
                directory: "batch".to_string(),
                recursive: true,
            })
            .unwrap();
        assert_eq!(plan.imports.len(), 1);
        assert!(plan.truncated);
    }

    #[test]
    fn test_finish_import_without_deletion_keeps_file() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());
        let loader = sideloader(temp_dir.path(), false, 0);
        let file = temp_dir.path().join("loose.txt");

        assert_eq!(loader.finish_import(&file, None), CleanupReport::default());
        assert!(file.exists());
    }

    #[test]
    fn test_finish_import_removes_emptied_directory() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());
        let loader = sideloader(temp_dir.path(), true, 0);
        let plan = loader
            .plan(&SideloadSource::Directory {
                directory: "batch".to_string(),
                recursive: true,
            })
            .unwrap();
        let ingest_dir = plan.directory.clone().unwrap();

        let mut reports = Vec::new();
        for import in &plan.imports {
            reports.push(loader.finish_import(&import.path, Some(&ingest_dir)));
        }

        assert!(reports.iter().all(|r| r.source_removed));
        assert!(!reports[0].directory_removed);
        assert!(reports.last().unwrap().directory_removed);
        assert!(!ingest_dir.exists());
        assert!(temp_dir.path().join("loose.txt").exists());
    }

    #[test]
    fn test_finish_import_refuses_outside_file() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let victim = outside.path().join("victim.txt");
        fs::write(&victim, "v").unwrap();
        let loader = sideloader(temp_dir.path(), true, 0);

        let report = loader.finish_import(&victim, None);
        assert!(!report.source_removed);
        assert!(victim.exists());
    }

    #[test]
    fn test_user_directory() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());
        let loader = sideloader(temp_dir.path(), false, 0);
        let root = fs::canonicalize(temp_dir.path()).unwrap();

        assert_eq!(loader.user_directory(""), Some(root.clone()));
        assert_eq!(loader.user_directory("batch"), Some(root.join("batch")));
        assert_eq!(loader.user_directory("missing"), Some(root.clone()));
        assert_eq!(loader.user_directory("../"), Some(root.clone()));
        assert_eq!(loader.user_directory("loose.txt"), Some(root));

        let unset = Sideloader::new(&SideloadSettings::configure(None, false, 0, 0));
        assert_eq!(unset.user_directory("batch"), None);
    }

    #[test]
    fn test_file_options() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());
        let loader = sideloader(temp_dir.path(), false, 0);

        let options = loader.file_options("batch");
        assert_eq!(
            options.options,
            vec![
                FileOption {
                    value: "batch/one.txt".to_string(),
                    label: "one.txt".to_string(),
                },
                FileOption {
                    value: "batch/two.txt".to_string(),
                    label: "two.txt".to_string(),
                },
                FileOption {
                    value: "batch/nested/three.txt".to_string(),
                    label: "nested/three.txt".to_string(),
                },
            ]
        );
        assert_eq!(options.placeholder(), "Select a file to sideload…");

        let from_root = loader.file_options("");
        assert_eq!(from_root.options[0].value, "loose.txt");
        assert_eq!(from_root.options[0].label, "loose.txt");
    }

    #[test]
    fn test_file_options_placeholder() {
        let temp_dir = TempDir::new().unwrap();
        create_drop_folder(temp_dir.path());

        let capped = sideloader(temp_dir.path(), false, 1).file_options("");
        assert!(capped.more_available);
        assert!(capped.placeholder().contains("only first ones"));

        let empty = TempDir::new().unwrap();
        let none = sideloader(empty.path(), false, 0).file_options("");
        assert!(none.options.is_empty());
        assert!(none.placeholder().starts_with("No file"));
    }
}
