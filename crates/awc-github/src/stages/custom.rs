//! User-declared jobs from the frontmatter `jobs:` and `safe-outputs.jobs:`.

use super::{PRE_ACTIVATION, StageContext, activated_check};
use crate::error::{CompileError, Result};
use crate::graph::GraphJob;
use crate::workflow::schema::Step;
use awc_core::JobFragment;
use serde_json::Value;

/// Deserialize user-written steps into Actions steps.
///
/// # Errors
///
/// Returns [`CompileError::InvalidStep`] naming the job and step position.
pub fn parse_steps(job: &str, steps: &[Value]) -> Result<Vec<Step>> {
    steps
        .iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value.clone()).map_err(|err| CompileError::InvalidStep {
                job: job.to_string(),
                index,
                message: err.to_string(),
            })
        })
        .collect()
}

/// Build one custom job.
///
/// With a gate present, the job waits for it and runs only when activated.
///
/// # Errors
///
/// Returns an error when a step does not match the Actions step shape.
pub fn build(ctx: &StageContext<'_>, name: &str, fragment: &JobFragment) -> Result<GraphJob> {
    let mut job = GraphJob::new(name, ctx.spec.runs_on.clone());
    job.steps = parse_steps(name, &fragment.steps)?;
    job.outputs.clone_from(&fragment.outputs);
    if ctx.guards.has_pre_activation {
        job.add_need(PRE_ACTIVATION);
        job.guard = Some(activated_check());
    }
    Ok(job)
}
