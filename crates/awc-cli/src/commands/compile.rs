use super::{run, summarize};
use crate::cli::{CliError, CompileArgs};
use tracing::instrument;

/// Compile every workflow and write its lock file.
///
/// # Errors
///
/// Returns [`CliError::Config`] for unusable arguments and
/// [`CliError::Failed`] when any workflow does not compile.
#[instrument(name = "compile_command", skip_all)]
pub fn execute(args: &CompileArgs, json: bool) -> Result<(), CliError> {
    let reports = run(&args.source, args.output_dir.as_deref(), true)?;
    summarize(&reports, json, "Compiled")
}
