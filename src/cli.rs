//! Command-line interface for podsynth
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Resumable document-to-podcast generation
#[derive(Parser, Debug)]
#[command(name = "podsynth", version, about = "Resumable document-to-podcast generation")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse an invocation budget.
///
/// Supports bare numbers (seconds) and any format accepted by `humantime`:
/// `30s`, `4m`, `1m30s`.
fn parse_budget(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a job from a document manifest
    Create {
        /// Job identifier
        job: String,

        /// Owner identifier
        #[arg(long, value_name = "ID")]
        owner: String,

        /// JSON manifest listing documents and their page images
        #[arg(long, value_name = "PATH")]
        documents: PathBuf,

        /// Declared language (overrides detection)
        #[arg(long, value_name = "LANG")]
        language: Option<String>,

        /// Target program length in minutes
        #[arg(long, value_name = "MINUTES")]
        minutes: Option<u32>,
    },

    /// Run one bounded slice of work
    Advance {
        /// Job identifier
        job: String,

        /// Wall-clock budget for this slice (e.g. 90s, 4m)
        #[arg(long, value_name = "DURATION", value_parser = parse_budget)]
        budget: Option<Duration>,
    },

    /// Advance repeatedly until the job is ready or fails
    Run {
        /// Job identifier
        job: String,

        /// Give up after this many slices
        #[arg(long, value_name = "N", default_value = "100")]
        max_steps: usize,

        /// Wall-clock budget per slice (e.g. 90s, 4m)
        #[arg(long, value_name = "DURATION", value_parser = parse_budget)]
        budget: Option<Duration>,
    },

    /// Show job status and progress
    Status {
        /// Job identifier
        job: String,

        /// Print the full job record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "podsynth",
            "create",
            "job-1",
            "--owner",
            "alice",
            "--documents",
            "docs.json",
            "--language",
            "de",
        ])
        .unwrap();
        match cli.command {
            Commands::Create {
                job,
                owner,
                documents,
                language,
                minutes,
            } => {
                assert_eq!(job, "job-1");
                assert_eq!(owner, "alice");
                assert_eq!(documents, PathBuf::from("docs.json"));
                assert_eq!(language.as_deref(), Some("de"));
                assert_eq!(minutes, None);
            }
            _ => panic!("Expected Create command"),
        }
    }

    #[test]
    fn test_create_requires_owner() {
        let result =
            Cli::try_parse_from(["podsynth", "create", "job-1", "--documents", "docs.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_advance_with_budget() {
        let cli = Cli::try_parse_from(["podsynth", "advance", "job-1", "--budget", "4m"]).unwrap();
        match cli.command {
            Commands::Advance { job, budget } => {
                assert_eq!(job, "job-1");
                assert_eq!(budget, Some(Duration::from_secs(240)));
            }
            _ => panic!("Expected Advance command"),
        }
    }

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["podsynth", "run", "job-1"]).unwrap();
        match cli.command {
            Commands::Run {
                max_steps, budget, ..
            } => {
                assert_eq!(max_steps, 100);
                assert_eq!(budget, None);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_parse_budget_formats() {
        assert_eq!(parse_budget("90"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_budget("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_budget(" 2m "), Ok(Duration::from_secs(120)));
        assert!(parse_budget("soon").is_err());
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["podsynth", "-vv", "status", "job-1"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_global_options_after_command() {
        let cli = Cli::try_parse_from([
            "podsynth",
            "status",
            "job-1",
            "--config",
            "/tmp/config.toml",
            "-q",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
        assert!(cli.quiet);
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::try_parse_from(["podsynth", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }

    #[test]
    fn test_missing_command_returns_error() {
        assert!(Cli::try_parse_from(["podsynth"]).is_err());
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["podsynth", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
