//! awc CLI Application
//!
//! Compiles agentic markdown workflows into GitHub Actions workflows.

// CLI binary needs to output to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod commands;
mod tracing;

use crate::cli::{Cli, Commands, EXIT_OK, exit_code_for, render_error};
use crate::tracing::{TracingConfig, init_tracing};
use ::tracing::{info_span, instrument};

fn main() {
    // Tracing may be unusable during a panic, so report directly.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();

    let config = TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
    };
    if let Err(err) = init_tracing(config) {
        eprintln!("{err:?}");
    }

    let span = info_span!("awc", correlation_id = %crate::tracing::correlation_id());
    let _guard = span.enter();

    let code = match run(&cli) {
        Ok(()) => EXIT_OK,
        Err(err) => {
            render_error(&err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

#[instrument(skip_all)]
fn run(cli: &Cli) -> Result<(), cli::CliError> {
    match &cli.command {
        Commands::Compile(args) => commands::compile::execute(args, cli.json),
        Commands::Validate(args) => commands::validate::execute(args, cli.json),
    }
}
