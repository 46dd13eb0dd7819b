use crate::tracing::{LogLevel, TracingFormat};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use miette::{Diagnostic, Report};
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// At least one workflow failed to compile
pub const EXIT_FAILED: i32 = 1;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;

/// Directory searched when no path is given
pub const DEFAULT_WORKFLOW_DIR: &str = ".github/workflows";

/// CLI-specific error types with exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// Bad arguments or unreadable inputs (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(awc::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Some workflows did not compile (exit code 1)
    #[error("{failed} of {total} workflow(s) failed")]
    #[diagnostic(code(awc::cli::failed))]
    Failed { failed: usize, total: usize },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

/// Get the exit code for a given error
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Failed { .. } => EXIT_FAILED,
    }
}

/// Print an error through miette's report handler
#[allow(clippy::print_stderr)]
pub fn render_error(err: &CliError) {
    eprintln!("{:?}", Report::new(err.clone()));
}

#[derive(Parser, Debug)]
#[command(name = "awc")]
#[command(about = "Compile agentic markdown workflows into GitHub Actions workflows")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        env = "AWC_LOG_LEVEL",
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        env = "AWC_LOG_FORMAT",
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    #[arg(long, global = true, help = "Print one JSON result per workflow")]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Compile workflows and write <name>.lock.yml next to each source")]
    Compile(CompileArgs),
    #[command(about = "Check that workflows compile without writing anything")]
    Validate(SourceArgs),
}

/// Inputs shared by every command.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    #[arg(
        help = "Workflow files or directories of workflows",
        default_value = DEFAULT_WORKFLOW_DIR
    )]
    pub paths: Vec<PathBuf>,

    #[arg(long, help = "JSON Schema the compiled workflow must conform to")]
    pub schema: Option<PathBuf>,

    #[arg(long, help = "Reference time for relative stop-after values (RFC 3339)")]
    pub now: Option<DateTime<Utc>>,
}

#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(short, long, help = "Write lock files here instead of next to each source")]
    pub output_dir: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["awc", "validate"]).unwrap();

        assert_eq!(cli.level, LogLevel::Warn);
        assert_eq!(cli.log_format, TracingFormat::Compact);
        assert!(!cli.json);
        let Commands::Validate(args) = cli.command else {
            panic!("Expected Validate command");
        };
        assert_eq!(args.paths, vec![PathBuf::from(DEFAULT_WORKFLOW_DIR)]);
        assert!(args.schema.is_none());
        assert!(args.now.is_none());
    }

    #[test]
    fn test_cli_log_level_parsing() {
        let cli = Cli::try_parse_from(["awc", "--level", "debug", "validate"]).unwrap();
        assert_eq!(cli.level, LogLevel::Debug);

        let cli = Cli::try_parse_from(["awc", "validate", "-l", "error"]).unwrap();
        assert_eq!(cli.level, LogLevel::Error);

        assert!(Cli::try_parse_from(["awc", "--level", "loud", "validate"]).is_err());
    }

    #[test]
    fn test_compile_command_with_options() {
        let cli = Cli::try_parse_from([
            "awc",
            "compile",
            "a.md",
            "workflows",
            "--output-dir",
            "out",
            "--schema",
            "schema.json",
            "--now",
            "2025-06-01T09:00:00Z",
        ])
        .unwrap();

        let Commands::Compile(args) = cli.command else {
            panic!("Expected Compile command");
        };
        assert_eq!(
            args.source.paths,
            vec![PathBuf::from("a.md"), PathBuf::from("workflows")]
        );
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert_eq!(args.source.schema, Some(PathBuf::from("schema.json")));
        assert_eq!(
            args.source.now.map(|now| now.to_rfc3339()),
            Some("2025-06-01T09:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_invalid_reference_time() {
        assert!(Cli::try_parse_from(["awc", "compile", "--now", "tomorrow"]).is_err());
    }

    #[test]
    fn test_missing_subcommand() {
        assert!(Cli::try_parse_from(["awc"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&CliError::config("bad")), EXIT_CLI);
        assert_eq!(
            exit_code_for(&CliError::Failed {
                failed: 1,
                total: 2
            }),
            EXIT_FAILED
        );
        assert_ne!(EXIT_OK, EXIT_FAILED);
    }

    #[test]
    fn test_failed_message() {
        let err = CliError::Failed {
            failed: 2,
            total: 5,
        };
        assert_eq!(err.to_string(), "2 of 5 workflow(s) failed");
    }
}
