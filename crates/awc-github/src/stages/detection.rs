//! The `detection` job.

use super::{AGENT, DETECTION, StageContext};
use crate::error::Result;
use crate::graph::GraphJob;
use awc_core::spec::DEFAULT_RUNNER;

/// Whether a detection job is built for this workflow.
#[must_use]
pub fn is_needed(ctx: &StageContext<'_>) -> bool {
    ctx.spec.safe_outputs.threat_detection && !ctx.spec.safe_outputs.is_empty()
}

/// Build the detection job.
///
/// # Errors
///
/// Currently infallible, but returns `Result` like every stage.
pub fn build(ctx: &StageContext<'_>) -> Result<GraphJob> {
    let mut job = GraphJob::new(DETECTION, DEFAULT_RUNNER)
        .with_output("success", ctx.detector.success_output());
    job.add_need(AGENT);
    job.timeout_minutes = Some(10);
    job.steps = ctx.detector.steps(ctx.spec, ctx.engine);
    Ok(job)
}
