use super::{run, summarize};
use crate::cli::{CliError, SourceArgs};
use tracing::instrument;

/// Compile every workflow in memory and report the outcome.
///
/// # Errors
///
/// Returns [`CliError::Config`] for unusable arguments and
/// [`CliError::Failed`] when any workflow does not compile.
#[instrument(name = "validate_command", skip_all)]
pub fn execute(args: &SourceArgs, json: bool) -> Result<(), CliError> {
    let reports = run(args, None, false)?;
    summarize(&reports, json, "Valid")
}
