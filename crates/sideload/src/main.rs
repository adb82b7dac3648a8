//! File Sideload
//!
//! Administrator tool for inspecting and exercising a sideload drop folder.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use sideload::config::Config;
use sideload::{EntryKind, ScanResult, SideloadSettings, SideloadSource, Sideloader};

/// File Sideload - import files from a server-side drop folder.
#[derive(Parser, Debug)]
#[command(name = "file-sideload")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Validate the configuration and show the resolved settings
    Check,

    /// Verify a path against the drop folder
    Verify {
        /// Path, absolute or relative to the drop folder
        path: String,

        /// Verify as a directory instead of a file
        #[arg(long)]
        dir: bool,
    },

    /// List files available for import
    Files {
        /// Directory to list (defaults to the user directory)
        directory: Option<String>,

        /// Include files of sub-directories
        #[arg(long, short)]
        recursive: bool,

        /// Maximum number of files (0 = unbounded)
        #[arg(long)]
        max: Option<usize>,
    },

    /// List directories available for import
    Dirs {
        /// Directory to list (defaults to the drop folder)
        directory: Option<String>,

        /// Maximum depth below the listed directory (0 = immediate children)
        #[arg(long)]
        depth: Option<usize>,

        /// Maximum number of directories (0 = unbounded)
        #[arg(long)]
        max: Option<usize>,
    },

    /// Show the imports a request would perform
    #[command(subcommand)]
    Plan(PlanCommands),

    /// Remove a directory that only holds empty directories
    Cleanup {
        /// Directory, absolute or relative to the drop folder
        directory: String,
    },
}

/// Subcommands for import planning.
#[derive(Subcommand, Debug, Clone)]
pub enum PlanCommands {
    /// Import a single file
    File {
        /// File, absolute or relative to the drop folder
        filename: String,
    },

    /// Import every file of a directory
    Dir {
        /// Directory, absolute or relative to the drop folder
        directory: String,

        /// Include files of sub-directories
        #[arg(long, short)]
        recursive: bool,
    },
}

impl From<PlanCommands> for SideloadSource {
    fn from(command: PlanCommands) -> Self {
        match command {
            PlanCommands::File { filename } => SideloadSource::SingleFile { filename },
            PlanCommands::Dir {
                directory,
                recursive,
            } => SideloadSource::Directory {
                directory,
                recursive,
            },
        }
    }
}

#[derive(Serialize)]
struct SettingsReport<'a> {
    root: Option<&'a Path>,
    delete_file: bool,
    max_files: usize,
    max_directories: usize,
}

#[derive(Serialize)]
struct VerifyReport {
    path: String,
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    canonical: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Initialize tracing
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.to_lowercase()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(config_path) = &cli.config {
        tracing::debug!("Using config file: {:?}", config_path);
    }

    // Validate configuration
    config.validate()?;

    let settings = SideloadSettings::from_config(&config.sideload);
    if !settings.is_configured() {
        tracing::warn!("No usable sideload directory is configured");
    }
    let loader = Sideloader::new(&settings);

    match cli.command {
        Commands::Check => {
            let limits = settings.limits();
            let report = SettingsReport {
                root: settings.root(),
                delete_file: settings.delete_file(),
                max_files: limits.max_files,
                max_directories: limits.max_directories,
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                match report.root {
                    Some(root) => println!("Sideload directory: {}", root.display()),
                    None => println!("Sideload directory: (not configured)"),
                }
                println!("  Delete after import: {}", report.delete_file);
                println!("  Max files:           {}", format_cap(report.max_files));
                println!("  Max directories:     {}", format_cap(report.max_directories));
            }
            if !settings.is_configured() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Verify { path, dir } => {
            let kind = if dir {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            let verifier = loader.scanner().verifier();
            let result = match verifier.resolve_candidate(&path) {
                Some(candidate) => verifier.check(&candidate, kind),
                None => Err(sideload::Rejection::RootUnset),
            };
            let report = match result {
                Ok(canonical) => VerifyReport {
                    path,
                    accepted: true,
                    canonical: Some(canonical),
                    reason: None,
                },
                Err(rejection) => VerifyReport {
                    path,
                    accepted: false,
                    canonical: None,
                    reason: Some(rejection.to_string()),
                },
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if let Some(canonical) = &report.canonical {
                println!("{}", canonical.display());
            } else if let Some(reason) = &report.reason {
                eprintln!("Rejected: {}", reason);
            }
            if !report.accepted {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Files {
            directory,
            recursive,
            max,
        } => {
            let dir = match directory {
                Some(dir) => resolve_listing_dir(&loader, &dir)?,
                None => loader
                    .user_directory(&config.sideload.user_directory)
                    .ok_or_else(|| anyhow::anyhow!("No sideload directory configured"))?,
            };
            let result = loader.scanner().list_files(&dir, recursive, max);
            print_scan_result(&result, cli.json, "file")?;
        }
        Commands::Dirs {
            directory,
            depth,
            max,
        } => {
            let dir = resolve_listing_dir(&loader, directory.as_deref().unwrap_or(""))?;
            let result = loader.scanner().list_dirs(&dir, depth, max);
            print_scan_result(&result, cli.json, "directory")?;
        }
        Commands::Plan(command) => {
            let source = SideloadSource::from(command);
            match loader.plan(&source) {
                Ok(plan) => {
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&plan)?);
                    } else if plan.imports.is_empty() {
                        println!("Nothing to import.");
                    } else {
                        for import in &plan.imports {
                            println!("{}", import.source_name);
                        }
                        if plan.truncated {
                            println!("(only the first {} files are included)", plan.imports.len());
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Cleanup { directory } => {
            let dir = resolve_listing_dir(&loader, &directory)?;
            if loader.scanner().remove_if_empty_and_removable(&dir) {
                println!("Removed {}", dir.display());
            } else {
                eprintln!("Not removed: {} holds files or is not removable", dir.display());
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Turn a CLI directory argument into a path under the drop folder.
///
/// An empty argument names the drop folder itself.
fn resolve_listing_dir(loader: &Sideloader, directory: &str) -> anyhow::Result<PathBuf> {
    let verifier = loader.scanner().verifier();
    let root = verifier
        .root()
        .ok_or_else(|| anyhow::anyhow!("No sideload directory configured"))?;
    if directory.is_empty() {
        return Ok(root.to_path_buf());
    }
    if sideload::files::is_illegal_candidate(directory) {
        anyhow::bail!("Illegal directory: {}", directory);
    }
    verifier
        .resolve_candidate(directory)
        .ok_or_else(|| anyhow::anyhow!("No sideload directory configured"))
}

fn print_scan_result(result: &ScanResult, json: bool, noun: &str) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    if result.is_empty() {
        println!("No {} available.", noun);
        return Ok(());
    }
    for path in &result.paths {
        println!("{}", path);
    }
    if result.more_available {
        println!("(only the first {} are listed)", result.len());
    }
    Ok(())
}

fn format_cap(cap: usize) -> String {
    if cap == 0 {
        "unbounded".to_string()
    } else {
        cap.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_command() {
        let cli = Cli::try_parse_from(["file-sideload", "check"]).unwrap();
        assert!(matches!(cli.command, Commands::Check));
        assert!(!cli.json);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "file-sideload",
            "files",
            "--json",
            "-v",
            "--config",
            "/tmp/sideload.toml",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sideload.toml")));
    }

    #[test]
    fn test_verify_command() {
        let cli = Cli::try_parse_from(["file-sideload", "verify", "batch", "--dir"]).unwrap();
        match cli.command {
            Commands::Verify { path, dir } => {
                assert_eq!(path, "batch");
                assert!(dir);
            }
            _ => panic!("Expected Verify command"),
        }
    }

    #[test]
    fn test_verify_requires_path() {
        assert!(Cli::try_parse_from(["file-sideload", "verify"]).is_err());
    }

    #[test]
    fn test_files_command() {
        let cli = Cli::try_parse_from(["file-sideload", "files", "batch", "-r", "--max", "10"])
            .unwrap();
        match cli.command {
            Commands::Files {
                directory,
                recursive,
                max,
            } => {
                assert_eq!(directory.as_deref(), Some("batch"));
                assert!(recursive);
                assert_eq!(max, Some(10));
            }
            _ => panic!("Expected Files command"),
        }
    }

    #[test]
    fn test_files_defaults() {
        let cli = Cli::try_parse_from(["file-sideload", "files"]).unwrap();
        match cli.command {
            Commands::Files {
                directory,
                recursive,
                max,
            } => {
                assert!(directory.is_none());
                assert!(!recursive);
                assert!(max.is_none());
            }
            _ => panic!("Expected Files command"),
        }
    }

    #[test]
    fn test_dirs_command() {
        let cli = Cli::try_parse_from(["file-sideload", "dirs", "--depth", "0", "--max", "5"])
            .unwrap();
        match cli.command {
            Commands::Dirs {
                directory,
                depth,
                max,
            } => {
                assert!(directory.is_none());
                assert_eq!(depth, Some(0));
                assert_eq!(max, Some(5));
            }
            _ => panic!("Expected Dirs command"),
        }
    }

    #[test]
    fn test_plan_dir_command() {
        let cli =
            Cli::try_parse_from(["file-sideload", "plan", "dir", "batch", "--recursive"]).unwrap();
        match cli.command {
            Commands::Plan(command) => {
                assert_eq!(
                    SideloadSource::from(command),
                    SideloadSource::Directory {
                        directory: "batch".to_string(),
                        recursive: true,
                    }
                );
            }
            _ => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_plan_file_command() {
        let cli = Cli::try_parse_from(["file-sideload", "plan", "file", "a.txt"]).unwrap();
        match cli.command {
            Commands::Plan(command) => {
                assert_eq!(
                    SideloadSource::from(command),
                    SideloadSource::SingleFile {
                        filename: "a.txt".to_string(),
                    }
                );
            }
            _ => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_cleanup_command() {
        let cli = Cli::try_parse_from(["file-sideload", "cleanup", "batch"]).unwrap();
        match cli.command {
            Commands::Cleanup { directory } => assert_eq!(directory, "batch"),
            _ => panic!("Expected Cleanup command"),
        }
    }

    #[test]
    fn test_format_cap() {
        assert_eq!(format_cap(0), "unbounded");
        assert_eq!(format_cap(1000), "1000");
    }
}
